//! Plain-value protocol constants, complementing `types::config::Config`'s
//! `typenum` container-sizing types. Split into its own trait (rather than
//! folded into `Config`) because a `typenum` type cannot carry a `u64` for
//! arithmetic use the way these reward/epoch/domain constants need.

use types::config::Config;
use types::primitives::{DomainType, Epoch, Gwei, Slot};

pub trait ExpConst: Config {
    fn genesis_slot() -> Slot {
        0
    }

    fn genesis_epoch() -> Epoch {
        0
    }

    fn far_future_epoch() -> Epoch {
        u64::max_value()
    }

    fn seconds_per_slot() -> u64 {
        6
    }

    fn min_attestation_inclusion_delay() -> Slot {
        1
    }

    fn min_seed_lookahead() -> Epoch {
        1
    }

    fn activation_exit_delay() -> Epoch {
        4
    }

    fn min_validator_withdrawability_delay() -> Epoch {
        256
    }

    fn persistent_committee_period() -> Epoch {
        2048
    }

    fn min_epochs_to_inactivity_penalty() -> Epoch {
        4
    }

    fn safe_slots_to_update_justified() -> Slot {
        8
    }

    fn shuffle_round_count() -> u64 {
        90
    }

    fn target_committee_size() -> u64 {
        128
    }

    fn max_committees_per_slot() -> u64 {
        64
    }

    fn min_per_epoch_churn_limit() -> u64 {
        4
    }

    fn churn_limit_quotient() -> u64 {
        65536
    }

    fn min_deposit_amount() -> Gwei {
        1_000_000_000
    }

    fn max_effective_balance() -> Gwei {
        32_000_000_000
    }

    fn ejection_balance() -> Gwei {
        16_000_000_000
    }

    fn effective_balance_increment() -> Gwei {
        1_000_000_000
    }

    fn base_reward_factor() -> u64 {
        64
    }

    fn base_rewards_per_epoch() -> u64 {
        4
    }

    fn whistleblower_reward_quotient() -> u64 {
        512
    }

    fn proposer_reward_quotient() -> u64 {
        8
    }

    fn inactivity_penalty_quotient() -> u64 {
        1 << 25
    }

    fn min_slashing_penalty_quotient() -> u64 {
        32
    }

    fn domain_beacon_proposer() -> DomainType {
        0x0000_0000
    }

    fn domain_attestation() -> DomainType {
        0x0100_0000
    }

    fn domain_randao() -> DomainType {
        0x0200_0000
    }

    fn domain_deposit() -> DomainType {
        0x0300_0000
    }

    fn domain_voluntary_exit() -> DomainType {
        0x0400_0000
    }

    fn min_genesis_active_validator_count() -> u64 {
        16_384
    }

    fn min_genesis_time() -> u64 {
        1_578_009_600
    }

    fn genesis_delay() -> u64 {
        172_800
    }
}

impl<C: Config> ExpConst for C {}
