pub mod consts;

pub use consts::ExpConst;
