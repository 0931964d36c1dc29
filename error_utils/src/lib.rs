use core::fmt::Debug;
use std::{error::Error, sync::Mutex};

use thiserror::Error;

// Some crates represent errors using types that do not implement `std::error::Error` or even
// `core::fmt::Display`. As a result, we cannot convert them into `anyhow::Error` directly.
#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct DebugAsError<E: Debug>(E);

impl<E: Debug> DebugAsError<E> {
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

// `anyhow` requires that the errors wrapped in `anyhow::Error` implement `Sync`.
#[derive(Debug, Error)]
#[error("{}", _0.lock().expect("another thread panicked while formatting error"))]
pub struct SyncError<E: Error>(Mutex<E>);

impl<E: Error> SyncError<E> {
    pub fn new(error: E) -> Self {
        Self(Mutex::new(error))
    }
}
