//! Protocol-parameter presets.
//!
//! `Config` carries the parameters that size SSZ containers (`VariableList`/
//! `FixedVector` capacities), so they are expressed as `typenum` unsigned
//! integers and threaded through every container type as a const generic.
//! Plain-value protocol constants (reward quotients, domain tags, epoch
//! thresholds) live on `core::consts::ExpConst` instead, since a `typenum`
//! type cannot carry a `u64` directly for arithmetic use.

use typenum::{U1024, U1099511627776, U128, U16, U16777216, U2048, U4, U64, U65536, U8, U8192};

pub trait Config: 'static + Default + Clone + Send + Sync + std::fmt::Debug {
    type ShardCount: typenum::Unsigned;
    type MaxValidatorsPerCommittee: typenum::Unsigned;
    type SlotsPerEpoch: typenum::Unsigned;
    type SlotsPerEth1VotingPeriod: typenum::Unsigned;
    type SlotsPerHistoricalRoot: typenum::Unsigned;
    type EpochsPerHistoricalVector: typenum::Unsigned;
    type EpochsPerSlashingsVector: typenum::Unsigned;
    type HistoricalRootsLimit: typenum::Unsigned;
    type ValidatorRegistryLimit: typenum::Unsigned;
    type MaxProposerSlashings: typenum::Unsigned;
    type MaxAttesterSlashings: typenum::Unsigned;
    type MaxAttestations: typenum::Unsigned;
    type MaxAttestationsPerEpoch: typenum::Unsigned;
    type MaxDeposits: typenum::Unsigned;
    type MaxVoluntaryExits: typenum::Unsigned;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MainnetConfig;

impl Config for MainnetConfig {
    type ShardCount = U1024;
    type MaxValidatorsPerCommittee = U2048;
    type SlotsPerEpoch = U64;
    type SlotsPerEth1VotingPeriod = U1024;
    type SlotsPerHistoricalRoot = U8192;
    type EpochsPerHistoricalVector = U65536;
    type EpochsPerSlashingsVector = U8192;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = typenum::U1;
    type MaxAttestations = U128;
    type MaxAttestationsPerEpoch = U8192;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MinimalConfig;

impl Config for MinimalConfig {
    type ShardCount = U1024;
    type MaxValidatorsPerCommittee = U2048;
    type SlotsPerEpoch = U8;
    type SlotsPerEth1VotingPeriod = U16;
    type SlotsPerHistoricalRoot = U64;
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = typenum::U1;
    type MaxAttestations = U128;
    type MaxAttestationsPerEpoch = U1024;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
}
