use core::consts::ExpConst;

use helper_functions::{
    beacon_state_accessors::{
        get_beacon_committee,
        get_beacon_proposer_index,
        get_committee_count_at_slot,
        get_current_epoch,
        get_domain,
        get_indexed_attestation,
        get_previous_epoch,
        get_randao_mix,
    },
    beacon_state_mutators::{
        increase_balance,
        initiate_validator_exit,
        slash_validator,
    },
    crypto::{
        bls_verify,
        hash,
        hash_tree_root,
        signed_root,
    },
    math::xor,
    misc::{
        compute_domain,
        compute_epoch_at_slot,
    },
    predicates::{
        is_active_validator,
        is_slashable_attestation_data,
        is_slashable_validator,
        is_valid_indexed_attestation,
        is_valid_merkle_branch,
    },
};
use std::collections::BTreeSet;
use std::convert::TryInto;
use typenum::marker_traits::Unsigned;
use types::{
    beacon_state::BeaconState,
    config::Config,
    consts::DEPOSIT_CONTRACT_TREE_DEPTH,
    types::{
        Attestation,
        AttesterSlashing,
        BeaconBlock,
        BeaconBlockBody,
        BeaconBlockHeader,
        Deposit,
        DepositMessage,
        PendingAttestation,
        ProposerSlashing,
        SignedBeaconBlock,
        SignedBeaconBlockHeader,
        SignedVoluntaryExit,
        Validator,
    },
};

pub fn process_block<T: Config + ExpConst>(
    state: &mut BeaconState<T>,
    signed_block: &SignedBeaconBlock<T>,
) {
    process_block_header(state, signed_block);
    process_randao(state, &signed_block.message.body);
    process_eth1_data(state, &signed_block.message.body);
    process_operations(state, &signed_block.message.body);
}

fn process_voluntary_exit<T: Config + ExpConst>(
    state: &mut BeaconState<T>,
    signed_exit: &SignedVoluntaryExit,
) {
    let exit = &signed_exit.message;
    let validator = &state.validators[exit.validator_index as usize];
    //# Verify the validator is active
    assert!(is_active_validator(&validator, get_current_epoch(state)));
    //# Verify the validator has not yet exited
    assert!(validator.exit_epoch == T::far_future_epoch());
    //# Exits must specify an epoch when they become valid; they are not valid before then
    assert!(get_current_epoch(state) >= exit.epoch);
    //# Verify the validator has been active long enough
    assert!(
        get_current_epoch(state) >= validator.activation_epoch + T::persistent_committee_period()
    );
    //# Verify signature
    let domain = get_domain(state, T::domain_voluntary_exit(), Some(exit.epoch));
    assert!(bls_verify(
        &bls::PublicKeyBytes::from_bytes(&validator.pubkey.as_bytes()).unwrap(),
        signed_root(exit).as_bytes(),
        &signed_exit.signature.clone().try_into().unwrap(),
        domain,
    )
    .unwrap());
    //# Initiate exit
    initiate_validator_exit(state, exit.validator_index).unwrap();
}

pub fn process_deposit<T: Config + ExpConst>(state: &mut BeaconState<T>, deposit: &Deposit) {
    //# Verify the Merkle branch
    assert!(is_valid_merkle_branch::<T>(
        &hash_tree_root(&deposit.data),
        &deposit.proof,
        DEPOSIT_CONTRACT_TREE_DEPTH + 1,
        state.eth1_deposit_index,
        &state.eth1_data.deposit_root,
    )
    .unwrap());

    //# Deposits must be processed in order
    state.eth1_deposit_index += 1;

    let pubkey = deposit.data.pubkey.clone();
    let amount = deposit.data.amount;

    if let Some(index) = state.validators.iter().position(|v| v.pubkey == pubkey) {
        //# Increase balance by deposit amount
        increase_balance(state, index as u64, amount).unwrap();
        return;
    }

    //# Verify the deposit signature (proof of possession) for new validators.
    //# Note: The deposit contract does not check signatures.
    //# Note: Deposits are valid across forks, thus the deposit domain is retrieved directly from `compute_domain`.
    let deposit_message = DepositMessage {
        pubkey: pubkey.clone(),
        withdrawal_credentials: deposit.data.withdrawal_credentials,
        amount,
    };
    let domain = compute_domain(T::domain_deposit(), None);

    if !bls_verify(
        &pubkey,
        signed_root(&deposit_message).as_bytes(),
        &deposit.data.signature,
        domain,
    )
    .unwrap()
    {
        return;
    }

    //# Add validator and balance entries
    state
        .validators
        .push(Validator {
            pubkey,
            withdrawal_credentials: deposit.data.withdrawal_credentials,
            activation_eligibility_epoch: T::far_future_epoch(),
            activation_epoch: T::far_future_epoch(),
            exit_epoch: T::far_future_epoch(),
            withdrawable_epoch: T::far_future_epoch(),
            effective_balance: std::cmp::min(
                amount - (amount % T::effective_balance_increment()),
                T::max_effective_balance(),
            ),
            slashed: false,
        })
        .unwrap();
    state.balances.push(amount).unwrap();
}

fn process_block_header<T: Config + ExpConst>(
    state: &mut BeaconState<T>,
    signed_block: &SignedBeaconBlock<T>,
) {
    let block = &signed_block.message;
    //# Verify that the slots match
    assert!(block.slot == state.slot);
    //# Verify that the parent matches
    assert!(block.parent_root == signed_root(&state.latest_block_header));
    //# Save current block as the new latest block
    state.latest_block_header = BeaconBlockHeader {
        slot: block.slot,
        parent_root: block.parent_root,
        //# `state_root` is zeroed and overwritten in the next `process_slot` call
        state_root: types::primitives::H256::zero(),
        body_root: hash_tree_root(&block.body),
    };
    //# Verify proposer is not slashed
    let proposer = &state.validators[get_beacon_proposer_index(&state).unwrap() as usize];
    assert!(!proposer.slashed);
    //# Verify proposer signature
    assert!(bls_verify(
        &bls::PublicKeyBytes::from_bytes(&proposer.pubkey.as_bytes()).unwrap(),
        signed_root(block).as_bytes(),
        &signed_block.signature.clone().try_into().unwrap(),
        get_domain(&state, T::domain_beacon_proposer(), None)
    )
    .unwrap());
}

fn process_randao<T: Config + ExpConst>(state: &mut BeaconState<T>, body: &BeaconBlockBody<T>) {
    let epoch = get_current_epoch(&state);
    //# Verify RANDAO reveal
    let proposer = &state.validators[get_beacon_proposer_index(&state).unwrap() as usize];
    assert!(bls_verify(
        &proposer.pubkey.clone().try_into().unwrap(),
        hash_tree_root(&epoch).as_bytes(),
        &body.randao_reveal.clone().try_into().unwrap(),
        get_domain(&state, T::domain_randao(), None)
    )
    .unwrap());
    //# Mix in RANDAO reveal
    let mix = xor(
        get_randao_mix(&state, epoch).unwrap().as_bytes(),
        &hash(&body.randao_reveal.as_bytes()),
    )
    .unwrap();
    let mut array = [0; 32];
    array.copy_from_slice(&mix[..array.len()]);
    state.randao_mixes[(epoch % T::EpochsPerHistoricalVector::to_u64()) as usize] =
        array.try_into().unwrap();
}

fn process_proposer_slashing<T: Config + ExpConst>(
    state: &mut BeaconState<T>,
    proposer_slashing: &ProposerSlashing,
) {
    let proposer = &state.validators[proposer_slashing.proposer_index as usize];
    //# Verify slots match
    assert_eq!(
        proposer_slashing.signed_header_1.message.slot,
        proposer_slashing.signed_header_2.message.slot
    );
    //# But the headers are different
    assert_ne!(
        proposer_slashing.signed_header_1,
        proposer_slashing.signed_header_2
    );
    //# Check proposer is slashable
    assert!(is_slashable_validator(&proposer, get_current_epoch(state)));
    //# Signatures are valid
    let headers: [SignedBeaconBlockHeader; 2] = [
        proposer_slashing.signed_header_1.clone(),
        proposer_slashing.signed_header_2.clone(),
    ];
    for signed_header in &headers {
        let domain = get_domain(
            state,
            T::domain_beacon_proposer(),
            Some(compute_epoch_at_slot::<T>(signed_header.message.slot)),
        );
        assert!(bls_verify(
            &proposer.pubkey.clone().try_into().unwrap(),
            signed_root(&signed_header.message).as_bytes(),
            &signed_header.signature.clone().try_into().unwrap(),
            domain
        )
        .unwrap());
    }

    let proposer_index = get_beacon_proposer_index(state).unwrap();
    slash_validator(state, proposer_slashing.proposer_index, None, proposer_index).unwrap();
}

fn process_attester_slashing<T: Config + ExpConst>(
    state: &mut BeaconState<T>,
    attester_slashing: &AttesterSlashing<T>,
) {
    let attestation_1 = &attester_slashing.attestation_1;
    let attestation_2 = &attester_slashing.attestation_2;
    assert!(is_slashable_attestation_data(
        &attestation_1.data,
        &attestation_2.data
    ));
    assert!(is_valid_indexed_attestation(state, &attestation_1).is_ok());
    assert!(is_valid_indexed_attestation(state, &attestation_2).is_ok());

    let mut slashed_any = false;

    let attesting_indices_1 = attestation_1
        .custody_bit_0_indices
        .iter()
        .chain(&attestation_1.custody_bit_1_indices)
        .cloned()
        .collect::<BTreeSet<_>>();
    let attesting_indices_2 = attestation_2
        .custody_bit_0_indices
        .iter()
        .chain(&attestation_2.custody_bit_1_indices)
        .cloned()
        .collect::<BTreeSet<_>>();

    for index in &attesting_indices_1 & &attesting_indices_2 {
        let validator = &state.validators[index as usize];

        if is_slashable_validator(&validator, get_current_epoch(state)) {
            let proposer_index = get_beacon_proposer_index(state).unwrap();
            slash_validator(state, index, None, proposer_index).unwrap();
            slashed_any = true;
        }
    }
    assert!(slashed_any);
}

fn process_attestation<T: Config + ExpConst>(
    state: &mut BeaconState<T>,
    attestation: &Attestation<T>,
) {
    let data = &attestation.data;
    let committee_index = data.index;
    assert!(committee_index < get_committee_count_at_slot(state, data.slot).unwrap());
    assert!(
        data.target.epoch == get_previous_epoch(state)
            || data.target.epoch == get_current_epoch(state)
    );
    assert!(
        data.slot + T::min_attestation_inclusion_delay() <= state.slot
            && state.slot <= data.slot + T::SlotsPerEpoch::to_u64()
    );

    let committee = get_beacon_committee(state, data.slot, committee_index).unwrap();
    assert_eq!(attestation.aggregation_bits.len(), committee.len());

    let pending_attestation = PendingAttestation {
        data: attestation.data.clone(),
        aggregation_bits: attestation.aggregation_bits.clone(),
        inclusion_delay: state.slot - data.slot,
        proposer_index: get_beacon_proposer_index(state).unwrap(),
    };

    if data.target.epoch == get_current_epoch(state) {
        assert_eq!(data.source, state.current_justified_checkpoint);
        state
            .current_epoch_attestations
            .push(pending_attestation)
            .unwrap();
    } else {
        assert_eq!(data.source, state.previous_justified_checkpoint);
        state
            .previous_epoch_attestations
            .push(pending_attestation)
            .unwrap();
    }

    //# Check signature
    assert!(is_valid_indexed_attestation(
        &state,
        &get_indexed_attestation(&state, &attestation).unwrap()
    )
    .is_ok());
}

fn process_eth1_data<T: Config + ExpConst>(state: &mut BeaconState<T>, body: &BeaconBlockBody<T>) {
    state.eth1_data_votes.push(body.eth1_data.clone()).unwrap();
    let num_votes = state
        .eth1_data_votes
        .iter()
        .filter(|vote| *vote == &body.eth1_data)
        .count();

    if (num_votes * 2) as u64 > T::SlotsPerEth1VotingPeriod::to_u64() {
        state.eth1_data = body.eth1_data.clone();
    }
}

fn process_operations<T: Config + ExpConst>(state: &mut BeaconState<T>, body: &BeaconBlockBody<T>) {
    //# Verify that outstanding deposits are processed up to the maximum number of deposits
    assert_eq!(
        body.deposits.len(),
        std::cmp::min(
            T::MaxDeposits::to_u64(),
            state.eth1_data.deposit_count - state.eth1_deposit_index
        ) as usize
    );

    for proposer_slashing in body.proposer_slashings.iter() {
        process_proposer_slashing(state, proposer_slashing);
    }
    for attester_slashing in body.attester_slashings.iter() {
        process_attester_slashing(state, attester_slashing);
    }
    for attestation in body.attestations.iter() {
        process_attestation(state, attestation);
    }
    for deposit in body.deposits.iter() {
        process_deposit(state, deposit);
    }
    for voluntary_exit in body.voluntary_exits.iter() {
        process_voluntary_exit(state, voluntary_exit);
    }
}
