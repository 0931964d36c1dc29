//! The nine-stage path a block takes from p2p ingress to a committed
//! post-state: locate parent, load pre-state, check pre-validity, persist +
//! broadcast, run the state transition, check the state root, do
//! epoch-boundary housekeeping, save the historical state, then clean up
//! operation-pool bookkeeping.
//!
//! Grounded on `beacon_node`'s `Node::accept_beacon_block` (previously a
//! single call straight into the in-memory fork-choice `Store`), expanded so
//! each step above persists through `chain_store::ChainStore` rather than
//! living only in memory.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;
use thiserror::Error;

use chain_store::{AttestationTarget, ChainStore};
use eth2_core::ExpConst;
use eth2_network::{BeaconBlockAnnounce, Broadcaster, DepositWatcher, OperationPoolSubscriber};
use helper_functions::{beacon_state_accessors, crypto};
use types::{
    beacon_state::BeaconState,
    config::Config,
    primitives::{Slot, UnixSeconds, H256},
    types::SignedBeaconBlock,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("block at slot 0 cannot be re-processed through the pipeline")]
    GenesisReplay,
    #[error("parent {0:?} is not known to the chain store")]
    UnknownParent(H256),
    #[error("failed to reconstruct the pre-state for the parent: {0}")]
    StatePreload(chain_store::Error),
    #[error("block slot {slot} is later than the local wall clock allows")]
    FromFuture { slot: Slot },
    #[error("eth1 block {0:?} referenced by the post-state is unknown to the deposit watcher")]
    UnknownEth1(H256),
    #[error("state transition failed processing the block: {0}")]
    BlockFailedProcessing(String),
    #[error("post-state root does not match the block's declared state root")]
    StateRootMismatch,
    #[error("chain store error: {0}")]
    Store(#[from] chain_store::Error),
}

/// Only these two cause the block to be evil-listed and deleted; every other
/// error leaves the store untouched so the caller may retry (e.g. once the
/// parent arrives).
impl Error {
    pub fn is_fatal_to_block(&self) -> bool {
        matches!(
            self,
            Error::BlockFailedProcessing(_) | Error::StateRootMismatch
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum CheckpointKind {
    Justified,
    Finalized,
}

/// Serializes the state-transition stage: at most one block is being
/// transitioned at a time, matching the pipeline mutex in the concurrency
/// model this crate implements.
pub struct BlockPipeline<C: Config> {
    store: Arc<ChainStore<C>>,
    transition_lock: Mutex<()>,
    seconds_per_slot: u64,
    verify_signatures: bool,
}

impl<C: Config + ExpConst> BlockPipeline<C> {
    pub fn new(store: Arc<ChainStore<C>>, verify_signatures: bool) -> Self {
        Self {
            store,
            transition_lock: Mutex::new(()),
            seconds_per_slot: C::seconds_per_slot(),
            verify_signatures,
        }
    }

    /// Runs a block through the full nine-stage pipeline, returning the
    /// committed post-state.
    pub fn receive_block(
        &self,
        block: SignedBeaconBlock<C>,
        now: UnixSeconds,
        deposit_watcher: &dyn DepositWatcher,
        broadcaster: &dyn Broadcaster,
        operation_pool: Option<&dyn OperationPoolSubscriber<C>>,
    ) -> Result<BeaconState<C>, Error> {
        // 1. Locate parent.
        let parent_root = block.message.parent_root;
        let parent = self
            .store
            .block(parent_root)?
            .ok_or(Error::UnknownParent(parent_root))?;

        // 2. Load pre-state.
        let pre_state = self
            .store
            .historical_state_from_slot(parent.message.slot, parent_root)
            .map_err(Error::StatePreload)?;

        // 3. Pre-validity.
        self.verify_block_validity(&block, &pre_state, now, deposit_watcher)?;

        // 4. Persist + broadcast. The save must precede the announce to
        // prevent re-ingest loops.
        let block_root = self.save_and_broadcast_block(&block, broadcaster)?;

        // 5 & 6. State transition, guarded by the pipeline mutex, with the
        // state-root check done ourselves so a bad block surfaces as an
        // error instead of aborting the process.
        let post_state = match self.advance_state(&pre_state, &block) {
            Ok(post_state) => post_state,
            Err(err) => {
                self.evict_block(&block, block_root)?;
                return Err(err);
            }
        };

        // 7. Epoch-boundary housekeeping.
        self.epoch_boundary_housekeeping(&pre_state, &post_state);

        // 8. Save historical state keyed by block signing root.
        self.store.save_state(&post_state)?;

        // 9. Cleanup.
        self.cleanup_block_operations(&block, operation_pool);

        Ok(post_state)
    }

    fn verify_block_validity(
        &self,
        block: &SignedBeaconBlock<C>,
        pre_state: &BeaconState<C>,
        now: UnixSeconds,
        deposit_watcher: &dyn DepositWatcher,
    ) -> Result<(), Error> {
        if block.message.slot == 0 {
            return Err(Error::GenesisReplay);
        }

        let earliest_allowed = pre_state.genesis_time + block.message.slot * self.seconds_per_slot;
        if now < earliest_allowed {
            return Err(Error::FromFuture {
                slot: block.message.slot,
            });
        }

        if !deposit_watcher.block_by_hash(pre_state.eth1_data.block_hash) {
            return Err(Error::UnknownEth1(pre_state.eth1_data.block_hash));
        }

        Ok(())
    }

    fn save_and_broadcast_block(
        &self,
        block: &SignedBeaconBlock<C>,
        broadcaster: &dyn Broadcaster,
    ) -> Result<H256, Error> {
        let block_root = crypto::hash_tree_root(&block.message);

        self.store.save_block(block.clone())?;
        self.store.save_attestation_target(AttestationTarget {
            slot: block.message.slot,
            beacon_block_root: block_root,
            parent_root: block.message.parent_root,
        })?;

        broadcaster.broadcast_block_announce(BeaconBlockAnnounce {
            hash: block_root,
            slot_number: block.message.slot,
        });

        Ok(block_root)
    }

    fn advance_state(
        &self,
        pre_state: &BeaconState<C>,
        block: &SignedBeaconBlock<C>,
    ) -> Result<BeaconState<C>, Error> {
        let _guard = self.transition_lock.lock();

        let mut state = pre_state.clone();
        let verify_signatures = self.verify_signatures;
        let transitioned = catch_unwind(AssertUnwindSafe(|| {
            transition_functions::process_slot::state_transition(&mut state, block, verify_signatures);
            state
        }))
        .map_err(|_| Error::BlockFailedProcessing("state transition panicked".to_string()))?;

        if crypto::hash_tree_root(&transitioned) != block.message.state_root {
            return Err(Error::StateRootMismatch);
        }

        Ok(transitioned)
    }

    fn evict_block(&self, block: &SignedBeaconBlock<C>, block_root: H256) -> Result<(), Error> {
        self.store.mark_evil_block_hash(block_root)?;
        self.store.delete_block(block)?;
        Ok(())
    }

    fn epoch_boundary_housekeeping(&self, pre_state: &BeaconState<C>, post_state: &BeaconState<C>) {
        let pre_epoch = beacon_state_accessors::get_current_epoch(pre_state);
        let post_epoch = beacon_state_accessors::get_current_epoch(post_state);

        if pre_epoch == post_epoch {
            return;
        }

        for (index, validator) in post_state.validators.iter().enumerate() {
            let index = index as u64;
            if validator.activation_epoch == post_epoch {
                if let Err(err) = self
                    .store
                    .save_validator_pubkey_index(&validator.pubkey, index)
                {
                    info!("failed to index newly activated validator {}: {}", index, err);
                }
            }
            if validator.exit_epoch == post_epoch {
                if let Err(err) = self.store.delete_validator_pubkey_index(&validator.pubkey) {
                    info!("failed to de-index exited validator {}: {}", index, err);
                }
            }
        }

        if post_state.current_justified_checkpoint.epoch > pre_state.current_justified_checkpoint.epoch
        {
            self.persist_checkpoint(post_state.current_justified_checkpoint.root, CheckpointKind::Justified);
        }

        if post_state.finalized_checkpoint.epoch > pre_state.finalized_checkpoint.epoch {
            self.persist_checkpoint(post_state.finalized_checkpoint.root, CheckpointKind::Finalized);
            self.store.clear_block_cache();
        }
    }

    /// Reconstructs the checkpoint's block and state and records them as the
    /// store's justified/finalized pointer. Logged and skipped rather than
    /// propagated: housekeeping runs after the block has already been
    /// committed, so a failure here shouldn't unwind a block that otherwise
    /// processed correctly.
    fn persist_checkpoint(&self, root: H256, kind: CheckpointKind) {
        let block = match self.store.block(root) {
            Ok(Some(block)) => block,
            Ok(None) => {
                info!("{:?} checkpoint block {:?} is not in the store", kind, root);
                return;
            }
            Err(err) => {
                info!("failed to load {:?} checkpoint block {:?}: {}", kind, root, err);
                return;
            }
        };

        let state = match self
            .store
            .historical_state_from_slot(block.message.slot, root)
        {
            Ok(state) => state,
            Err(err) => {
                info!(
                    "failed to reconstruct {:?} checkpoint state for {:?}: {}",
                    kind, root, err
                );
                return;
            }
        };

        let result = match kind {
            CheckpointKind::Justified => self
                .store
                .save_justified_block(&block)
                .and_then(|()| self.store.save_justified_state(&state)),
            CheckpointKind::Finalized => self
                .store
                .save_finalized_block(&block)
                .and_then(|()| self.store.save_finalized_state(&state)),
        };

        if let Err(err) = result {
            info!("failed to persist {:?} checkpoint at {:?}: {}", kind, root, err);
        }
    }

    fn cleanup_block_operations(
        &self,
        block: &SignedBeaconBlock<C>,
        operation_pool: Option<&dyn OperationPoolSubscriber<C>>,
    ) {
        match operation_pool {
            Some(subscriber) => subscriber.notify_block_processed(block),
            None => info!("no operation-pool subscriber registered; dropping processed block notification"),
        }

        for deposit in block.message.body.deposits.iter() {
            if let Err(err) = self.store.remove_pending_deposit(deposit) {
                info!("failed to remove pending deposit: {}", err);
            }
        }
    }
}
