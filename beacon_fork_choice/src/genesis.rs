//! Genesis state construction from an initial deposit list and `Eth1Data`.
//!
//! Mirrors the protocol's genesis-from-deposits procedure: every deposit is
//! run through the regular deposit-processing path (merkle-proof check
//! included), after which any validator funded to the maximum effective
//! balance is activated immediately rather than going through the normal
//! activation queue.

use eth2_core::ExpConst;
use helper_functions::{beacon_state_accessors, crypto::hash};
use transition_functions::blocks::block_processing::process_deposit;
use ssz_types::FixedVector;
use types::{
    beacon_state::BeaconState,
    config::Config,
    consts::DEPOSIT_CONTRACT_TREE_DEPTH,
    primitives::H256,
    types::{BeaconBlock, Deposit, Eth1Data, SignedBeaconBlock},
};

/// Incremental Merkle tree matching the eth1 deposit contract's accumulator.
/// Produces, for each inserted leaf, the 33-entry proof
/// (`DEPOSIT_CONTRACT_TREE_DEPTH` sibling hashes plus the length mix-in) that
/// `is_valid_merkle_branch` expects, and the resulting root.
struct DepositTree {
    branch: Vec<H256>,
    zero_hashes: Vec<H256>,
    size: u64,
}

impl DepositTree {
    fn new() -> Self {
        let depth = DEPOSIT_CONTRACT_TREE_DEPTH as usize;
        let mut zero_hashes = vec![H256::zero(); depth];
        for i in 1..depth {
            zero_hashes[i] = combine(&zero_hashes[i - 1], &zero_hashes[i - 1]);
        }
        Self {
            branch: vec![H256::zero(); depth],
            zero_hashes,
            size: 0,
        }
    }

    fn push_leaf(&mut self, leaf: H256) -> (Vec<H256>, H256) {
        let depth = DEPOSIT_CONTRACT_TREE_DEPTH as usize;
        let index = self.size;

        let mut proof = Vec::with_capacity(depth + 1);
        let mut root = leaf;
        for i in 0..depth {
            if (index >> i) & 1 == 0 {
                proof.push(self.zero_hashes[i]);
                root = combine(&root, &self.zero_hashes[i]);
            } else {
                proof.push(self.branch[i]);
                root = combine(&self.branch[i], &root);
            }
        }

        self.size += 1;

        let mut count_bytes = [0_u8; 32];
        count_bytes[..8].copy_from_slice(&self.size.to_le_bytes());
        let count_leaf = H256::from_slice(&count_bytes);
        proof.push(count_leaf);
        root = combine(&root, &count_leaf);

        // Fold the new leaf into the running branch for future insertions.
        let mut value = leaf;
        for i in 0..depth {
            if (index >> i) & 1 == 0 {
                self.branch[i] = value;
                break;
            }
            value = combine(&self.branch[i], &value);
        }

        (proof, root)
    }
}

fn combine(left: &H256, right: &H256) -> H256 {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(left.as_bytes());
    bytes.extend_from_slice(right.as_bytes());
    H256::from_slice(&hash(&bytes))
}

/// Builds the genesis state from an ordered list of initial deposits.
///
/// Unlike ordinary deposits made during a block, the merkle proofs here are
/// generated on the fly from the deposit data itself, since the deposits are
/// trusted to be exactly the ones recorded by the deposit watcher in order.
pub fn initialize_beacon_state_from_eth1<C: Config + ExpConst>(
    eth1_block_hash: H256,
    eth1_timestamp: u64,
    deposit_data: &[types::types::DepositData],
) -> BeaconState<C> {
    let genesis_time = eth1_timestamp + C::genesis_delay();

    let mut state: BeaconState<C> = BeaconState {
        genesis_time,
        eth1_data: Eth1Data {
            deposit_root: H256::zero(),
            deposit_count: deposit_data.len() as u64,
            block_hash: eth1_block_hash,
        },
        ..BeaconState::default()
    };

    for mix in state.randao_mixes.iter_mut() {
        *mix = eth1_block_hash;
    }

    let mut tree = DepositTree::new();
    for data in deposit_data {
        let (proof, root) = tree.push_leaf(helper_functions::crypto::hash_tree_root(data));
        state.eth1_data.deposit_root = root;

        let deposit = Deposit {
            proof: FixedVector::from(proof),
            data: data.clone(),
        };
        process_deposit(&mut state, &deposit);
    }

    process_activations(&mut state);

    state
}

fn process_activations<C: Config + ExpConst>(state: &mut BeaconState<C>) {
    let genesis_epoch = C::genesis_epoch();
    for validator in state.validators.iter_mut() {
        if validator.effective_balance == C::max_effective_balance() {
            validator.activation_eligibility_epoch = genesis_epoch;
            validator.activation_epoch = genesis_epoch;
        }
    }
}

/// Whether a candidate genesis state has enough stake and has waited long
/// enough past the minimum genesis time to start the chain.
pub fn is_valid_genesis_state<C: Config + ExpConst>(state: &BeaconState<C>) -> bool {
    if state.genesis_time < C::min_genesis_time() {
        return false;
    }

    let active_validator_count =
        beacon_state_accessors::get_active_validator_indices(state, C::genesis_epoch()).len() as u64;
    active_validator_count >= C::min_genesis_active_validator_count()
}

/// Builds the genesis block whose `state_root` commits to `state`.
///
/// Note that `BeaconBlock.slot` is always `0` even when `C::genesis_slot()` is
/// not, and `body.eth1_data` is intentionally left at its default rather than
/// `state.eth1_data`.
pub fn genesis_block<C: Config + ExpConst>(state: &BeaconState<C>) -> SignedBeaconBlock<C> {
    SignedBeaconBlock {
        message: BeaconBlock {
            state_root: helper_functions::crypto::hash_tree_root(state),
            ..BeaconBlock::default()
        },
        ..SignedBeaconBlock::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::config::MinimalConfig;

    #[test]
    fn genesis_state_has_no_validators_without_deposits() {
        let state = initialize_beacon_state_from_eth1::<MinimalConfig>(H256::zero(), 0, &[]);
        assert!(state.validators.is_empty());
        assert!(!is_valid_genesis_state(&state));
    }

    #[test]
    fn genesis_block_state_root_matches_state() {
        let state = initialize_beacon_state_from_eth1::<MinimalConfig>(H256::zero(), 0, &[]);
        let block = genesis_block(&state);
        assert_eq!(
            block.message.state_root,
            helper_functions::crypto::hash_tree_root(&state)
        );
    }
}
