use core::consts::ExpConst;
use ssz_types::{BitList, VariableList};
use std::cmp;
use std::collections::BTreeSet;
use std::convert::TryFrom;
use typenum::marker_traits::Unsigned;
use types::{beacon_state::BeaconState, config::Config, primitives::*, types::*};

use crate::{
    crypto::hash,
    error::Error,
    math::{int_to_bytes, int_to_bytes_32},
    misc::{compute_committee, compute_domain, compute_epoch_at_slot, compute_shuffled_index},
    predicates::is_active_validator,
};

pub fn get_current_epoch<C: Config>(state: &BeaconState<C>) -> Epoch {
    compute_epoch_at_slot::<C>(state.slot)
}

pub fn get_previous_epoch<C: Config>(state: &BeaconState<C>) -> Epoch {
    let current_epoch = get_current_epoch(state);
    let genesis_epoch = C::genesis_epoch();

    if current_epoch > genesis_epoch {
        current_epoch - 1
    } else {
        genesis_epoch
    }
}

pub fn get_block_root<C: Config>(state: &BeaconState<C>, epoch: Epoch) -> Result<H256, Error> {
    // todo: change to compute start slot of epoch when implemented
    get_block_root_at_slot(state, epoch * C::SlotsPerEpoch::to_u64())
}

pub fn get_block_root_at_slot<C: Config>(
    state: &BeaconState<C>,
    slot: Slot,
) -> Result<H256, Error> {
    if !(slot < state.slot && state.slot <= slot + C::SlotsPerHistoricalRoot::to_u64()) {
        return Err(Error::SlotOutOfRange);
    }

    match usize::try_from(slot % C::SlotsPerHistoricalRoot::to_u64()) {
        Err(_err) => Err(Error::IndexOutOfRange),
        Ok(id) => Ok(state.block_roots[id]),
    }
}

pub fn get_randao_mix<C: Config>(state: &BeaconState<C>, epoch: Epoch) -> Result<H256, Error> {
    match usize::try_from(epoch) {
        Err(_err) => Err(Error::IndexOutOfRange),
        Ok(id) => Ok(state.randao_mixes[id % C::EpochsPerHistoricalVector::to_usize()]),
    }
}

pub fn get_active_validator_indices<C: Config>(
    state: &BeaconState<C>,
    epoch: Epoch,
) -> Vec<ValidatorIndex> {
    let mut active_validator_indices = Vec::new();
    for (i, v) in state.validators.iter().enumerate() {
        if is_active_validator(v, epoch) {
            active_validator_indices.push(i as u64);
        }
    }
    active_validator_indices
}

pub fn get_validator_churn_limit<C: Config>(state: &BeaconState<C>) -> Result<u64, Error> {
    let active_validator_indices = get_active_validator_indices(state, get_current_epoch(state));

    Ok(cmp::max(
        C::min_per_epoch_churn_limit(),
        active_validator_indices.len() as u64 / C::churn_limit_quotient(),
    ))
}

pub fn get_seed<C: Config>(
    state: &BeaconState<C>,
    epoch: Epoch,
    domain_type: DomainType,
) -> Result<H256, Error> {
    let mix = get_randao_mix::<C>(
        state,
        epoch + C::EpochsPerHistoricalVector::to_u64() - C::min_seed_lookahead() - 1,
    )?;

    let mut seed = vec![];
    seed.append(&mut int_to_bytes_32(domain_type, 4));
    seed.append(&mut int_to_bytes(epoch, 8));
    seed.append(&mut mix.as_bytes().to_vec());

    Ok(H256::from_slice(&hash(&seed[..])))
}

pub fn get_committee_count<C: Config>(state: &BeaconState<C>, epoch: Epoch) -> Result<u64, Error> {
    let committees_per_slot = cmp::min(
        C::ShardCount::to_u64() / C::SlotsPerEpoch::to_u64(),
        get_active_validator_indices(state, epoch).len() as u64,
    );

    Ok(cmp::max(1, committees_per_slot) * C::SlotsPerEpoch::to_u64())
}

pub fn get_committee_count_at_slot<C: Config>(
    state: &BeaconState<C>,
    slot: Slot,
) -> Result<u64, Error> {
    let epoch = compute_epoch_at_slot::<C>(slot);
    Ok(get_committee_count::<C>(state, epoch)? / C::SlotsPerEpoch::to_u64())
}

const MAX_RANDOM_BYTE: u64 = 255;

pub fn get_beacon_proposer_index<C: Config>(state: &BeaconState<C>) -> Result<ValidatorIndex, Error> {
    let epoch = get_current_epoch(state);

    let mut seed_input = get_seed::<C>(state, epoch, C::domain_beacon_proposer())?
        .as_bytes()
        .to_vec();
    seed_input.append(&mut int_to_bytes(state.slot, 8));
    let seed = hash(&seed_input);

    let indices = get_active_validator_indices(state, epoch);
    if indices.is_empty() {
        return Err(Error::IndexOutOfRange);
    }
    let total = indices.len() as u64;

    let mut i = 0_u64;
    loop {
        let shuffled = compute_shuffled_index::<C>(i % total, total, H256::from_slice(&seed))?;
        let candidate_index = indices[shuffled as usize];

        let mut round_input = seed.clone();
        round_input.append(&mut int_to_bytes(i / 32, 8));
        let random_byte = u64::from(hash(&round_input)[(i % 32) as usize]);

        let effective_balance = state.validators[candidate_index as usize].effective_balance;
        if effective_balance * MAX_RANDOM_BYTE >= C::max_effective_balance() * random_byte {
            return Ok(candidate_index);
        }
        i += 1;
    }
}

pub fn get_beacon_committee<C: Config>(
    state: &BeaconState<C>,
    slot: Slot,
    index: CommitteeIndex,
) -> Result<Vec<ValidatorIndex>, Error> {
    let epoch = compute_epoch_at_slot::<C>(slot);
    let committees_per_slot = get_committee_count_at_slot::<C>(state, slot)?;
    compute_committee::<C>(
        &get_active_validator_indices(state, epoch),
        &get_seed::<C>(state, epoch, C::domain_attestation())?,
        (slot % C::SlotsPerEpoch::to_u64()) * committees_per_slot + index,
        committees_per_slot * C::SlotsPerEpoch::to_u64(),
    )
}

pub fn get_total_balance<C: Config>(
    state: &BeaconState<C>,
    indices: &[ValidatorIndex],
) -> Result<u64, Error> {
    let mut sum = 0;
    for (_i, index) in indices.iter().enumerate() {
        match usize::try_from(*index) {
            Err(_err) => return Err(Error::IndexOutOfRange),
            Ok(id) => sum += state.validators[id].effective_balance,
        }
    }
    Ok(sum)
}

pub fn get_total_active_balance<C: Config>(state: &BeaconState<C>) -> Result<u64, Error> {
    get_total_balance::<C>(
        state,
        &get_active_validator_indices::<C>(state, get_current_epoch::<C>(state)),
    )
}

pub fn get_domain<C: Config>(
    state: &BeaconState<C>,
    domain_type: DomainType,
    message_epoch: Option<Epoch>,
) -> Domain {
    let epoch = message_epoch.unwrap_or_else(|| get_current_epoch(state));
    let fork_version = if epoch < state.fork.epoch {
        state.fork.previous_version
    } else {
        state.fork.current_version
    };
    compute_domain(domain_type, Some(fork_version))
}

pub fn get_attesting_indices<C: Config>(
    state: &BeaconState<C>,
    data: &AttestationData,
    bits: &BitList<C::MaxValidatorsPerCommittee>,
) -> Result<BTreeSet<ValidatorIndex>, Error> {
    let committee = get_beacon_committee::<C>(state, data.slot, data.index)?;
    if bits.len() != committee.len() {
        return Err(Error::AttestationBitsInvalid);
    }
    Ok(committee
        .iter()
        .enumerate()
        .filter_map(|(i, index)| match bits.get(i) {
            Ok(true) => Some(*index),
            _ => None,
        })
        .collect())
}

pub fn get_indexed_attestation<C: Config>(
    state: &BeaconState<C>,
    attestation: &Attestation<C>,
) -> Result<IndexedAttestation<C>, Error> {
    let attesting_indices =
        get_attesting_indices::<C>(state, &attestation.data, &attestation.aggregation_bits)?;

    Ok(IndexedAttestation {
        custody_bit_0_indices: VariableList::from(attesting_indices.into_iter().collect::<Vec<_>>()),
        custody_bit_1_indices: VariableList::from(vec![]),
        data: attestation.data.clone(),
        signature: attestation.signature.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz_types::{FixedVector, VariableList};
    use types::config::MainnetConfig;
    use types::types::Validator;

    #[test]
    fn test_get_current_epoch() {
        let bs: BeaconState<MainnetConfig> = BeaconState {
            slot: 9,
            ..BeaconState::default()
        };
        assert_eq!(get_current_epoch::<MainnetConfig>(&bs), 1);
    }

    #[test]
    fn test_get_previous_epoch() {
        let bs: BeaconState<MainnetConfig> = BeaconState {
            slot: 17,
            ..BeaconState::default()
        };
        assert_eq!(get_previous_epoch(&bs), 1);
    }

    #[test]
    fn test_get_previous_epoch_genesis() {
        let bs: BeaconState<MainnetConfig> = BeaconState {
            slot: 0,
            ..BeaconState::default()
        };
        assert_eq!(get_previous_epoch(&bs), MainnetConfig::genesis_epoch());
    }

    #[test]
    fn test_get_block_root() {
        let mut block_roots_vec = Vec::new();

        for x in 0..32 {
            block_roots_vec.push(H256::from([x; 32]));
        }

        let bs: BeaconState<MainnetConfig> = BeaconState {
            slot: 32,
            block_roots: FixedVector::from(block_roots_vec),
            ..BeaconState::default()
        };

        assert_eq!(get_block_root(&bs, 3), Ok(H256::from([24; 32])));
    }

    #[test]
    fn test_get_block_root_at_slot() {
        let bs: BeaconState<MainnetConfig> = BeaconState {
            slot: 2,
            block_roots: FixedVector::from(vec![H256::from([0; 32]), H256::from([1; 32])]),
            ..BeaconState::default()
        };
        assert_eq!(get_block_root_at_slot(&bs, 1), Ok(H256::from([1; 32])));
    }

    #[test]
    fn test_get_block_root_at_slot_slot_equals_beacon_state_slot() {
        let bs: BeaconState<MainnetConfig> = BeaconState {
            slot: 0,
            ..BeaconState::default()
        };
        assert_eq!(
            get_block_root_at_slot(&bs, 0).err(),
            Some(Error::SlotOutOfRange),
        );
    }

    #[test]
    fn test_get_randao_mix() {
        let bs: BeaconState<MainnetConfig> = BeaconState {
            randao_mixes: FixedVector::from(vec![
                H256::from([5; 32]),
                H256::from([5; 32]),
                H256::from([5; 32]),
            ]),
            ..BeaconState::default()
        };

        assert_eq!(get_randao_mix(&bs, 2), Ok(H256::from([5; 32])))
    }

    #[test]
    fn test_get_active_validator_indices() {
        let v1 = Validator {
            activation_epoch: 1,
            exit_epoch: 2,
            ..Validator::default()
        };
        let v2 = Validator {
            activation_epoch: 0,
            exit_epoch: 1,
            ..Validator::default()
        };
        let bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v1, v2]),
            ..BeaconState::default()
        };
        assert_eq!(get_active_validator_indices(&bs, 0), vec![1]);
    }

    #[test]
    fn test_get_validator_churn_limit() {
        let v1 = Validator {
            effective_balance: 11,
            activation_epoch: 0,
            exit_epoch: 2,
            ..Validator::default()
        };
        let bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v1]),
            ..BeaconState::default()
        };

        assert_eq!(
            get_validator_churn_limit(&bs),
            Ok(MainnetConfig::min_per_epoch_churn_limit())
        )
    }

    #[test]
    fn test_get_committee_count() {
        let v1 = Validator {
            effective_balance: 11,
            activation_epoch: 0,
            exit_epoch: 2,
            ..Validator::default()
        };
        let bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v1]),
            ..BeaconState::default()
        };

        assert_eq!(
            get_committee_count(&bs, 0_u64),
            Ok(<MainnetConfig as Config>::ShardCount::to_u64())
        )
    }

    #[test]
    fn test_get_active_balance() {
        let v1 = Validator {
            effective_balance: 11,
            activation_epoch: 0,
            exit_epoch: 2,
            ..Validator::default()
        };
        let v2 = Validator {
            effective_balance: 7,
            activation_epoch: 0,
            exit_epoch: 1,
            ..Validator::default()
        };
        let v3 = Validator {
            effective_balance: 5,
            activation_epoch: 0,
            exit_epoch: 1,
            ..Validator::default()
        };
        let bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v1, v2, v3]),
            ..BeaconState::default()
        };

        assert_eq!(get_total_balance(&bs, &[0, 2]), Ok(16_u64))
    }

    #[test]
    fn test_get_total_active_balance() {
        let v1 = Validator {
            effective_balance: 10,
            activation_epoch: 0,
            exit_epoch: 2,
            ..Validator::default()
        };
        let v2 = Validator {
            effective_balance: 2,
            activation_epoch: 0,
            exit_epoch: 1,
            ..Validator::default()
        };
        let bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v1, v2]),
            ..BeaconState::default()
        };

        assert_eq!(get_total_active_balance(&bs), Ok(12_u64))
    }

    #[test]
    fn test_get_seed_is_deterministic() {
        let bs: BeaconState<MainnetConfig> = BeaconState::default();
        let seed_1 = get_seed::<MainnetConfig>(&bs, 0, MainnetConfig::domain_attestation());
        let seed_2 = get_seed::<MainnetConfig>(&bs, 0, MainnetConfig::domain_attestation());
        assert_eq!(seed_1, seed_2);
    }

    #[test]
    fn test_get_seed_differs_per_domain_type() {
        let bs: BeaconState<MainnetConfig> = BeaconState::default();
        let attestation_seed =
            get_seed::<MainnetConfig>(&bs, 0, MainnetConfig::domain_attestation()).unwrap();
        let randao_seed =
            get_seed::<MainnetConfig>(&bs, 0, MainnetConfig::domain_randao()).unwrap();
        assert_ne!(attestation_seed, randao_seed);
    }

    #[test]
    fn test_get_beacon_proposer_index_picks_a_fully_staked_validator() {
        let validators = (0..4)
            .map(|_| Validator {
                effective_balance: MainnetConfig::max_effective_balance(),
                activation_epoch: 0,
                exit_epoch: MainnetConfig::far_future_epoch(),
                ..Validator::default()
            })
            .collect::<Vec<_>>();
        let bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(validators),
            ..BeaconState::default()
        };
        let proposer_index = get_beacon_proposer_index(&bs).unwrap();
        assert!(proposer_index < 4);
    }

    #[test]
    fn test_get_domain_uses_previous_version_before_fork_epoch() {
        let fork = Fork {
            previous_version: Version::from([0; 4]),
            current_version: Version::from([1, 0, 0, 0]),
            epoch: 10,
        };
        let bs: BeaconState<MainnetConfig> = BeaconState {
            fork,
            ..BeaconState::default()
        };
        let before = get_domain::<MainnetConfig>(&bs, MainnetConfig::domain_attestation(), Some(5));
        let after = get_domain::<MainnetConfig>(&bs, MainnetConfig::domain_attestation(), Some(10));
        assert_ne!(before, after);
    }
}
