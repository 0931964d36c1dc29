use std::cmp::max;
use std::convert::TryFrom;

use typenum::marker_traits::Unsigned;

use core::consts::ExpConst;
use types::{
    beacon_state::BeaconState,
    config::Config,
    primitives::{Epoch, Gwei, ValidatorIndex},
};

use crate::{
    beacon_state_accessors::{get_current_epoch, get_validator_churn_limit},
    error::Error,
    misc::compute_activation_exit_epoch,
};

pub fn increase_balance<C: Config>(
    state: &mut BeaconState<C>,
    index: ValidatorIndex,
    delta: Gwei,
) -> Result<(), Error> {
    let id = usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
    state.balances[id] += delta;
    Ok(())
}

pub fn decrease_balance<C: Config>(
    state: &mut BeaconState<C>,
    index: ValidatorIndex,
    delta: Gwei,
) -> Result<(), Error> {
    let id = usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
    state.balances[id] = state.balances[id].saturating_sub(delta);
    Ok(())
}

pub fn initiate_validator_exit<C: Config>(
    state: &mut BeaconState<C>,
    index: ValidatorIndex,
) -> Result<(), Error> {
    let id = usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;

    if state.validators[id].exit_epoch != C::far_future_epoch() {
        return Ok(());
    }

    let current_epoch = get_current_epoch::<C>(state);
    let delayed_activation_exit_epoch = compute_activation_exit_epoch::<C>(current_epoch);

    let mut exit_queue_epoch = state
        .validators
        .iter()
        .map(|v| v.exit_epoch)
        .filter(|&epoch| epoch != C::far_future_epoch())
        .chain(std::iter::once(delayed_activation_exit_epoch))
        .max()
        .unwrap_or(delayed_activation_exit_epoch);

    let exit_queue_churn = state
        .validators
        .iter()
        .filter(|v| v.exit_epoch == exit_queue_epoch)
        .count() as u64;

    if exit_queue_churn >= get_validator_churn_limit::<C>(state)? {
        exit_queue_epoch += 1;
    }

    state.validators[id].exit_epoch = exit_queue_epoch;
    state.validators[id].withdrawable_epoch =
        exit_queue_epoch + C::min_validator_withdrawability_delay();

    Ok(())
}

/// Slashes the validator at `slashed_index`. `proposer_index` identifies the block proposer who
/// receives the proposer's share of the reward; the rest goes to `whistleblower_index`, which
/// defaults to the proposer when no distinct whistleblower is known.
pub fn slash_validator<C: Config>(
    state: &mut BeaconState<C>,
    slashed_index: ValidatorIndex,
    whistleblower_index: Option<ValidatorIndex>,
    proposer_index: ValidatorIndex,
) -> Result<(), Error> {
    let epoch = get_current_epoch::<C>(state);
    initiate_validator_exit::<C>(state, slashed_index)?;

    let id = usize::try_from(slashed_index).map_err(|_| Error::IndexOutOfRange)?;
    let effective_balance = state.validators[id].effective_balance;

    state.validators[id].slashed = true;
    state.validators[id].withdrawable_epoch = max(
        state.validators[id].withdrawable_epoch,
        epoch + C::EpochsPerSlashingsVector::to_u64(),
    );

    let slashings_index = (epoch % C::EpochsPerSlashingsVector::to_u64()) as usize;
    state.slashings[slashings_index] += effective_balance;
    decrease_balance::<C>(
        state,
        slashed_index,
        effective_balance / C::min_slashing_penalty_quotient(),
    )?;

    let whistleblower_index = whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = effective_balance / C::whistleblower_reward_quotient();
    let proposer_reward = whistleblower_reward / C::proposer_reward_quotient();

    increase_balance::<C>(state, proposer_index, proposer_reward)?;
    increase_balance::<C>(
        state,
        whistleblower_index,
        whistleblower_reward - proposer_reward,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz_types::VariableList;
    use types::config::MainnetConfig;
    use types::types::Validator;

    #[test]
    fn test_increase_balance() {
        let mut bs: BeaconState<MainnetConfig> = BeaconState {
            balances: VariableList::from(vec![0]),
            ..BeaconState::default()
        };
        increase_balance(&mut bs, 0, 1).unwrap();
        assert_eq!(bs.balances[0], 1);
    }

    #[test]
    fn test_decrease_balance() {
        let mut bs: BeaconState<MainnetConfig> = BeaconState {
            balances: VariableList::from(vec![5]),
            ..BeaconState::default()
        };
        decrease_balance(&mut bs, 0, 3).unwrap();
        assert_eq!(bs.balances[0], 2);
    }

    #[test]
    fn test_decrease_balance_saturates_at_zero() {
        let mut bs: BeaconState<MainnetConfig> = BeaconState {
            balances: VariableList::from(vec![0]),
            ..BeaconState::default()
        };
        decrease_balance(&mut bs, 0, 1).unwrap();
        assert_eq!(bs.balances[0], 0);
    }

    #[test]
    fn test_initiate_validator_exit_sets_exit_epoch() {
        let v = Validator {
            exit_epoch: MainnetConfig::far_future_epoch(),
            ..Validator::default()
        };
        let mut bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v]),
            balances: VariableList::from(vec![0]),
            ..BeaconState::default()
        };
        initiate_validator_exit(&mut bs, 0).unwrap();
        assert_ne!(bs.validators[0].exit_epoch, MainnetConfig::far_future_epoch());
    }

    #[test]
    fn test_initiate_validator_exit_is_idempotent() {
        let v = Validator {
            exit_epoch: 5,
            ..Validator::default()
        };
        let mut bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v]),
            balances: VariableList::from(vec![0]),
            ..BeaconState::default()
        };
        initiate_validator_exit(&mut bs, 0).unwrap();
        assert_eq!(bs.validators[0].exit_epoch, 5);
    }

    #[test]
    fn test_slash_validator_marks_slashed_and_penalizes() {
        let v = Validator {
            effective_balance: 32_000_000_000,
            exit_epoch: MainnetConfig::far_future_epoch(),
            withdrawable_epoch: MainnetConfig::far_future_epoch(),
            ..Validator::default()
        };
        let proposer = Validator::default();
        let mut bs: BeaconState<MainnetConfig> = BeaconState {
            validators: VariableList::from(vec![v, proposer]),
            balances: VariableList::from(vec![32_000_000_000, 0]),
            ..BeaconState::default()
        };
        slash_validator::<MainnetConfig>(&mut bs, 0, None, 1).unwrap();
        assert!(bs.validators[0].slashed);
        assert!(bs.balances[0] < 32_000_000_000);
        assert!(bs.balances[1] > 0);
    }
}
