//! Capability-trait contracts at the node's boundary: p2p block/attestation
//! ingress and broadcast, the deposit watcher's chain-start feed, and the
//! operation-pool subscription. The transports that implement these (libp2p,
//! the eth1 watcher) live outside this crate; it only names the surface the
//! rest of the node is built against.

use std::sync::Arc;

use anyhow::Result;

use types::{
    config::Config,
    primitives::{Epoch, Slot, UnixSeconds, Version, H256},
    types::{Attestation, Deposit, Eth1Data, SignedBeaconBlock},
};

/// A snapshot of chain status exchanged during peer handshakes.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Status {
    pub fork_version: Version,
    pub finalized_root: H256,
    pub finalized_epoch: Epoch,
    pub head_root: H256,
    pub head_slot: Slot,
}

/// Announcement published after a block has been saved, so peers can fetch it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BeaconBlockAnnounce {
    pub hash: H256,
    pub slot_number: Slot,
}

/// What the p2p transport expects from the node: somewhere to hand off
/// incoming blocks and attestations, and a status summary to answer with.
pub trait Networked<C: Config> {
    fn accept_beacon_block(&mut self, block: SignedBeaconBlock<C>) -> Result<()>;
    fn accept_beacon_attestation(&mut self, attestation: Attestation<C>) -> Result<()>;
    fn get_status(&self) -> Status;
    fn get_beacon_block(&self, root: H256) -> Option<Arc<SignedBeaconBlock<C>>>;
}

/// What the node expects from the eth1 deposit watcher: the one-shot
/// chain-start signal plus on-demand eth1 block lookups used by the block
/// pipeline's pre-validity check.
pub trait DepositWatcher {
    /// Blocks (logically, not literally) until the chain-start event fires,
    /// then yields the genesis time that came with it.
    fn chain_start_feed(&self) -> Option<UnixSeconds>;
    fn chain_start_deposits(&self) -> Vec<Deposit>;
    fn chain_start_eth1_data(&self) -> Eth1Data;
    /// Whether `hash` is a block the watcher has observed on the eth1 chain.
    fn block_by_hash(&self, hash: H256) -> bool;
}

/// Receives processed blocks after the pipeline commits them. The pipeline
/// logs rather than errors when nothing is subscribed.
pub trait OperationPoolSubscriber<C: Config> {
    fn notify_block_processed(&self, block: &SignedBeaconBlock<C>);
}

/// Outbound side of the p2p transport: what the pipeline publishes once a
/// block has been saved.
pub trait Broadcaster {
    fn broadcast_block_announce(&self, announce: BeaconBlockAnnounce);
}
