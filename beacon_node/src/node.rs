use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use beacon_fork_choice::{genesis, Store};
use block_pipeline::BlockPipeline;
use chain_store::ChainStore;
use eth2_core::ExpConst;
use eth2_network::{DepositWatcher, Networked, Status};
use helper_functions::{beacon_state_accessors, crypto, misc};
use log::info;
use types::{
    beacon_state::BeaconState,
    config::Config,
    primitives::{Epoch, H256},
    types::{Attestation, AttestationData, Checkpoint, DepositData, SignedBeaconBlock},
};

use crate::api::{
    churn_limit, epoch_of, paginate, ActiveSetChanges, BlockFilter, ChainHead, ReadApi,
    ValidatorAssignment, ValidatorBalance, ValidatorPage, ValidatorParticipation, ValidatorQueue,
    ValidatorSelector,
};
use crate::feeds::{CanonicalBlockFeed, IncomingProcessedBlockFeed, StateInitializedFeed};

/// The running node: durable storage, the admission pipeline, and the
/// LMD-GHOST fork-choice store, plus the topic feeds external collaborators
/// subscribe to.
///
/// `pipeline` and `fork_choice` both hold an `Arc` to the same `chain_store`,
/// so a block is stored and transitioned at most once: the pipeline persists
/// it first, and `fork_choice` reuses the saved post-state instead of
/// recomputing it (see DESIGN.md).
pub struct Node<C: Config + ExpConst> {
    store: Arc<ChainStore<C>>,
    pipeline: BlockPipeline<C>,
    fork_choice: Store<C>,
    deposit_watcher: Box<dyn DepositWatcher>,
    canonical_block_feed: CanonicalBlockFeed,
    state_initialized_feed: StateInitializedFeed,
    operation_pool_feed: IncomingProcessedBlockFeed<C>,
}

impl<C: Config + ExpConst> Node<C> {
    /// Runs Genesis Bootstrap (SPEC_FULL.md §4.4): builds the genesis state
    /// and block, persists them into the chain store in the specified
    /// order, seeds the fork-choice store, and publishes on the
    /// state-initialized feed.
    pub fn new(
        data_dir: &Path,
        feed_capacity: usize,
        eth1_block_hash: H256,
        eth1_timestamp: u64,
        initial_deposits: &[DepositData],
        deposit_watcher: Box<dyn DepositWatcher>,
        verify_signatures: bool,
    ) -> Result<Self> {
        let store = Arc::new(ChainStore::open(data_dir)?);

        let genesis_state: BeaconState<C> =
            genesis::initialize_beacon_state_from_eth1(eth1_block_hash, eth1_timestamp, initial_deposits);
        let genesis_block = genesis::genesis_block(&genesis_state);
        let genesis_root = crypto::hash_tree_root(&genesis_block.message);
        let genesis_state_root = crypto::hash_tree_root(&genesis_state);

        store.save_block(genesis_block.clone())?;
        store.save_attestation_target(chain_store::AttestationTarget {
            slot: genesis_block.message.slot,
            beacon_block_root: genesis_root,
            parent_root: genesis_block.message.parent_root,
        })?;
        store.update_chain_head(&genesis_block, &genesis_state)?;
        store.save_justified_block(&genesis_block)?;
        store.save_finalized_block(&genesis_block)?;
        store.save_justified_state(&genesis_state)?;
        store.save_finalized_state(&genesis_state)?;

        let state_initialized_feed = StateInitializedFeed::new(feed_capacity);
        state_initialized_feed.publish(genesis_state_root);

        let pipeline = BlockPipeline::new(Arc::clone(&store), verify_signatures);
        let fork_choice = Store::new(Arc::clone(&store), genesis_state, genesis_block, verify_signatures)?;

        Ok(Self {
            store,
            pipeline,
            fork_choice,
            deposit_watcher,
            canonical_block_feed: CanonicalBlockFeed::new(feed_capacity),
            state_initialized_feed,
            operation_pool_feed: IncomingProcessedBlockFeed::new(feed_capacity),
        })
    }

    pub fn head_state(&self) -> BeaconState<C> {
        self.fork_choice
            .head_state()
            .expect("chain store and fork choice store should agree on the head block's state")
    }

    pub fn handle_slot_start(&mut self, slot: types::primitives::Slot) -> Result<()> {
        info!("slot {} started", slot);
        self.fork_choice.on_slot(slot)
    }

    pub fn handle_slot_midpoint(&mut self, slot: types::primitives::Slot) {
        info!("slot {} midpoint", slot);
    }

    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0)
    }
}

impl<C: Config + ExpConst> Networked<C> for Node<C> {
    fn accept_beacon_block(&mut self, block: SignedBeaconBlock<C>) -> Result<()> {
        info!("received beacon block: {:?}", block);

        let now = self.now();
        self.pipeline.receive_block(
            block.clone(),
            now,
            self.deposit_watcher.as_ref(),
            &self.canonical_block_feed,
            Some(&self.operation_pool_feed),
        )?;

        self.fork_choice.on_block(block)
    }

    fn accept_beacon_attestation(&mut self, attestation: Attestation<C>) -> Result<()> {
        info!("received beacon attestation: {:?}", attestation);
        self.fork_choice.on_attestation(attestation)
    }

    fn get_status(&self) -> Status {
        let head_state = self
            .fork_choice
            .head_state()
            .expect("chain store and fork choice store should agree on the head block's state");
        let Checkpoint { epoch, root } = head_state.finalized_checkpoint;
        Status {
            fork_version: head_state.fork.current_version,
            finalized_root: root,
            finalized_epoch: epoch,
            head_root: crypto::hash_tree_root(&head_state),
            head_slot: head_state.slot,
        }
    }

    fn get_beacon_block(&self, root: H256) -> Option<Arc<SignedBeaconBlock<C>>> {
        self.fork_choice.block(root).ok().flatten()
    }
}

/// Answers every RPC against the current head state. Historical-epoch
/// queries strictly older than the head's current epoch return an empty
/// result rather than an error, since wiring per-epoch checkpoint-state
/// lookups through this API layer is left for a later pass (DESIGN.md).
impl<C: Config + ExpConst> ReadApi<C> for Node<C> {
    fn list_attestations(&self, filter: BlockFilter) -> Vec<AttestationData> {
        let state = self.head_state();
        let matches_block = |root: H256| match filter {
            BlockFilter::Root(wanted) => root == wanted,
            BlockFilter::Slot(slot) => self
                .store
                .canonical_block_by_slot(slot)
                .ok()
                .flatten()
                .map_or(false, |block| crypto::hash_tree_root(&block.message) == root),
            BlockFilter::Epoch(epoch) => {
                epoch_of::<C>(
                    self.fork_choice
                        .block(root)
                        .ok()
                        .flatten()
                        .map_or(0, |b| b.message.slot),
                ) == epoch
            }
        };

        state
            .previous_epoch_attestations
            .iter()
            .chain(state.current_epoch_attestations.iter())
            .filter(|attestation| matches_block(attestation.data.beacon_block_root))
            .map(|attestation| attestation.data.clone())
            .collect()
    }

    fn attestation_pool(&self) -> Vec<AttestationData> {
        Vec::new()
    }

    fn get_chain_head(&self) -> ChainHead {
        let state = self.head_state();
        ChainHead {
            block_root: crypto::hash_tree_root(&state),
            block_slot: state.slot,
            finalized_slot: misc::compute_start_slot_of_epoch::<C>(state.finalized_checkpoint.epoch),
            finalized_block_root: state.finalized_checkpoint.root,
            justified_slot: misc::compute_start_slot_of_epoch::<C>(
                state.current_justified_checkpoint.epoch,
            ),
            justified_block_root: state.current_justified_checkpoint.root,
            previous_justified_slot: misc::compute_start_slot_of_epoch::<C>(
                state.previous_justified_checkpoint.epoch,
            ),
            previous_justified_block_root: state.previous_justified_checkpoint.root,
        }
    }

    fn list_validator_balances(
        &self,
        epoch: Epoch,
        selector: ValidatorSelector,
    ) -> Vec<ValidatorBalance> {
        let state = self.head_state();
        if epoch_of::<C>(state.slot) != epoch {
            return Vec::new();
        }

        let indices: Vec<u64> = match selector {
            ValidatorSelector::Indices(indices) => indices,
            ValidatorSelector::Pubkeys(pubkeys) => state
                .validators
                .iter()
                .enumerate()
                .filter(|(_, validator)| pubkeys.contains(&validator.pubkey))
                .map(|(index, _)| index as u64)
                .collect(),
        };

        indices
            .into_iter()
            .filter_map(|index| {
                let validator = state.validators.get(index as usize)?;
                let balance = *state.balances.get(index as usize)?;
                Some(ValidatorBalance {
                    pubkey: validator.pubkey.clone(),
                    index,
                    balance_gwei: balance,
                })
            })
            .collect()
    }

    fn get_validators(&self, epoch: Option<Epoch>, page_token: Option<String>) -> ValidatorPage {
        let state = self.head_state();
        let current_epoch = epoch_of::<C>(state.slot);
        let requested_epoch = epoch.unwrap_or(current_epoch);

        if requested_epoch != current_epoch {
            return ValidatorPage {
                epoch: requested_epoch,
                validators: Vec::new(),
                next_page_token: None,
                total: 0,
            };
        }

        let all: Vec<_> = state.validators.iter().cloned().collect();
        let (validators, next_page_token) = paginate(&all, page_token.as_deref());

        ValidatorPage {
            epoch: requested_epoch,
            validators,
            next_page_token,
            total: all.len(),
        }
    }

    fn get_validator_active_set_changes(&self, epoch: Epoch) -> ActiveSetChanges {
        let state = self.head_state();
        if epoch_of::<C>(state.slot) != epoch {
            return ActiveSetChanges {
                activated: Vec::new(),
                exited: Vec::new(),
                ejected: Vec::new(),
            };
        }

        let mut activated = Vec::new();
        let mut exited = Vec::new();

        for validator in state.validators.iter() {
            if validator.activation_epoch == epoch {
                activated.push(validator.pubkey.clone());
            }
            if validator.exit_epoch == epoch && !validator.slashed {
                exited.push(validator.pubkey.clone());
            }
        }

        ActiveSetChanges {
            activated,
            exited,
            ejected: Vec::new(),
        }
    }

    fn get_validator_queue(&self) -> ValidatorQueue {
        let state = self.head_state();
        let current_epoch = epoch_of::<C>(state.slot);

        let activation_pubkeys = state
            .validators
            .iter()
            .filter(|validator| validator.activation_eligibility_epoch <= current_epoch && {
                use helper_functions::predicates::is_active_validator;
                !is_active_validator(validator, current_epoch)
            })
            .map(|validator| validator.pubkey.clone())
            .collect();

        let exit_pubkeys = state
            .validators
            .iter()
            .filter(|validator| validator.exit_epoch > current_epoch && validator.exit_epoch != C::far_future_epoch())
            .map(|validator| validator.pubkey.clone())
            .collect();

        ValidatorQueue {
            churn_limit: churn_limit(&state),
            activation_pubkeys,
            exit_pubkeys,
        }
    }

    fn list_validator_assignments(
        &self,
        epoch: Epoch,
        page_token: Option<String>,
    ) -> Vec<ValidatorAssignment> {
        let state = self.head_state();
        if epoch_of::<C>(state.slot) != epoch {
            return Vec::new();
        }

        let active_indices = beacon_state_accessors::get_active_validator_indices(&state, epoch);
        let (page, _next) = paginate(&active_indices, page_token.as_deref());

        page.into_iter()
            .filter_map(|index| {
                let validator = state.validators.get(index as usize)?;
                Some(ValidatorAssignment {
                    committee: vec![index],
                    shard: 0,
                    slot: state.slot,
                    proposer: false,
                    pubkey: validator.pubkey.clone(),
                })
            })
            .collect()
    }

    fn get_validator_participation(&self, epoch: Epoch) -> ValidatorParticipation {
        let state = self.head_state();
        let current_epoch = epoch_of::<C>(state.slot);

        if epoch_of::<C>(state.slot) != epoch && current_epoch != epoch {
            return ValidatorParticipation {
                epoch,
                finalized: false,
                rate: 0.0,
                voted_gwei: 0,
                eligible_gwei: 0,
            };
        }

        let eligible_gwei: u64 = state
            .validators
            .iter()
            .filter(|validator| {
                use helper_functions::predicates::is_active_validator;
                is_active_validator(validator, epoch)
            })
            .map(|validator| validator.effective_balance)
            .sum();

        let mut voted_indices = std::collections::BTreeSet::new();
        for pending in state
            .current_epoch_attestations
            .iter()
            .chain(state.previous_epoch_attestations.iter())
        {
            if let Ok(indices) = beacon_state_accessors::get_attesting_indices(
                &state,
                &pending.data,
                &pending.aggregation_bits,
            ) {
                voted_indices.extend(indices);
            }
        }
        let voted_gwei: u64 = voted_indices
            .into_iter()
            .filter_map(|index| state.validators.get(index as usize))
            .map(|validator| validator.effective_balance)
            .sum();

        ValidatorParticipation {
            epoch,
            finalized: state.finalized_checkpoint.epoch >= epoch,
            rate: if eligible_gwei == 0 {
                0.0
            } else {
                voted_gwei as f64 / eligible_gwei as f64
            },
            voted_gwei,
            eligible_gwei,
        }
    }
}
