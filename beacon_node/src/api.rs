//! Read-only query surface a gRPC/HTTP gateway would sit in front of.
//!
//! Modeled as a capability trait with plain Rust return types, the same way
//! `eth2_network::Networked` models the p2p boundary — no transport is
//! implemented here, per the read API being named only by its interface.

use helper_functions::{beacon_state_accessors, misc};
use types::{
    config::Config,
    primitives::{Epoch, Gwei, PublicKeyBytes, Slot, ValidatorIndex, H256},
    types::{AttestationData, Validator},
};

/// One of the three ways callers may filter `ListBlocks`/`ListAttestations`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockFilter {
    Root(H256),
    Slot(Slot),
    Epoch(Epoch),
}

pub struct ChainHead {
    pub block_root: H256,
    pub block_slot: Slot,
    pub finalized_slot: Slot,
    pub finalized_block_root: H256,
    pub justified_slot: Slot,
    pub justified_block_root: H256,
    pub previous_justified_slot: Slot,
    pub previous_justified_block_root: H256,
}

pub struct ValidatorBalance {
    pub pubkey: PublicKeyBytes,
    pub index: ValidatorIndex,
    pub balance_gwei: Gwei,
}

/// Either a set of pubkeys or a set of indices — `ListValidatorBalances`'s
/// filter is one or the other, never both.
pub enum ValidatorSelector {
    Pubkeys(Vec<PublicKeyBytes>),
    Indices(Vec<ValidatorIndex>),
}

pub struct ValidatorPage {
    pub epoch: Epoch,
    pub validators: Vec<Validator>,
    pub next_page_token: Option<String>,
    pub total: usize,
}

pub struct ActiveSetChanges {
    pub activated: Vec<PublicKeyBytes>,
    pub exited: Vec<PublicKeyBytes>,
    pub ejected: Vec<PublicKeyBytes>,
}

pub struct ValidatorQueue {
    pub churn_limit: u64,
    pub activation_pubkeys: Vec<PublicKeyBytes>,
    pub exit_pubkeys: Vec<PublicKeyBytes>,
}

pub struct ValidatorAssignment {
    pub committee: Vec<ValidatorIndex>,
    pub shard: u64,
    pub slot: Slot,
    pub proposer: bool,
    pub pubkey: PublicKeyBytes,
}

pub struct ValidatorParticipation {
    pub epoch: Epoch,
    pub finalized: bool,
    pub rate: f64,
    pub voted_gwei: Gwei,
    pub eligible_gwei: Gwei,
}

/// Bit-exact surface of spec.md §6's Read API table. `RPC should not return
/// NOT_FOUND` for empty filter results; implementations return an empty list
/// instead.
pub trait ReadApi<C: Config> {
    /// Returns the attestation data each matching block's post-state recorded
    /// (state retains `{data, aggregation_bits, inclusion_delay,
    /// proposer_index}` per attestation, not the original signed form).
    fn list_attestations(&self, filter: BlockFilter) -> Vec<AttestationData>;
    fn attestation_pool(&self) -> Vec<AttestationData>;
    fn get_chain_head(&self) -> ChainHead;
    fn list_validator_balances(
        &self,
        epoch: Epoch,
        selector: ValidatorSelector,
    ) -> Vec<ValidatorBalance>;
    fn get_validators(&self, epoch: Option<Epoch>, page_token: Option<String>) -> ValidatorPage;
    fn get_validator_active_set_changes(&self, epoch: Epoch) -> ActiveSetChanges;
    fn get_validator_queue(&self) -> ValidatorQueue;
    fn list_validator_assignments(
        &self,
        epoch: Epoch,
        page_token: Option<String>,
    ) -> Vec<ValidatorAssignment>;
    fn get_validator_participation(&self, epoch: Epoch) -> ValidatorParticipation;
}

/// Per-page cap for the paginated RPCs; `next_page_token` is just the
/// stringified offset of the next page, opaque to callers.
pub const DEFAULT_PAGE_SIZE: usize = 250;

pub(crate) fn paginate<T: Clone>(items: &[T], page_token: Option<&str>) -> (Vec<T>, Option<String>) {
    let offset = page_token
        .and_then(|token| token.parse::<usize>().ok())
        .unwrap_or(0);

    let page: Vec<T> = items
        .iter()
        .skip(offset)
        .take(DEFAULT_PAGE_SIZE)
        .cloned()
        .collect();

    let next_offset = offset + page.len();
    let next_page_token = if next_offset < items.len() {
        Some(next_offset.to_string())
    } else {
        None
    };

    (page, next_page_token)
}

pub(crate) fn churn_limit<C: Config>(
    state: &types::beacon_state::BeaconState<C>,
) -> u64 {
    beacon_state_accessors::get_validator_churn_limit(state).unwrap_or(1)
}

pub(crate) fn epoch_of<C: Config>(slot: Slot) -> Epoch {
    misc::compute_epoch_at_slot::<C>(slot)
}
