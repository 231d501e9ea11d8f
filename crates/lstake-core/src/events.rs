// ─────────────────────────────────────────────────────────────────
// Structured event log
// ─────────────────────────────────────────────────────────────────
// Every state-changing step emits one Event. The serialized form is
// `EVENT_JSON:{"event":"<name>",...}` where <name> is a stable identifier
// that monitoring and tests match on literally (epoch_stake_failed,
// sync_validator_balance_failed_large_diff, ...).
// ─────────────────────────────────────────────────────────────────

use serde::Serialize;

use crate::{u128_str, Balance, EpochHeight};

pub const EVENT_PREFIX: &str = "EVENT_JSON:";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // user ledger
    Deposit {
        account_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    Stake {
        account_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    Unstake {
        account_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
        available_epoch: EpochHeight,
    },
    Withdraw {
        account_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },

    // validator registry
    ValidatorAdded {
        validator_id: String,
        weight: u32,
    },
    ValidatorRemoved {
        validator_id: String,
    },
    ValidatorWeightUpdated {
        validator_id: String,
        old_weight: u32,
        new_weight: u32,
    },

    // epoch actions
    EpochStakeAttempt {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    EpochStakeSuccess {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    EpochStakeFailed {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
        error: String,
    },
    EpochUnstakeAttempt {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    EpochUnstakeSuccess {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    EpochUnstakeFailed {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
        error: String,
    },
    EpochWithdrawAttempt {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    EpochWithdrawSuccess {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
    },
    EpochWithdrawFailed {
        validator_id: String,
        #[serde(with = "u128_str")]
        amount: Balance,
        error: String,
    },
    EpochUpdateRewards {
        validator_id: String,
        #[serde(with = "u128_str")]
        old_balance: Balance,
        #[serde(with = "u128_str")]
        new_balance: Balance,
        #[serde(with = "u128_str")]
        rewards: Balance,
        #[serde(with = "u128_str")]
        fee: Balance,
    },
    EpochUpdateRewardsFailed {
        validator_id: String,
        error: String,
    },

    // reconciliation
    SyncValidatorBalanceSuccess {
        validator_id: String,
        #[serde(with = "u128_str")]
        staked_amount: Balance,
        #[serde(with = "u128_str")]
        unstaked_amount: Balance,
    },
    SyncValidatorBalanceFailedCantGetAccount {
        validator_id: String,
        error: String,
    },
    SyncValidatorBalanceFailedLargeDiff {
        validator_id: String,
        #[serde(with = "u128_str")]
        expected_staked: Balance,
        #[serde(with = "u128_str")]
        reported_staked: Balance,
        #[serde(with = "u128_str")]
        expected_unstaked: Balance,
        #[serde(with = "u128_str")]
        reported_unstaked: Balance,
    },
}

impl Event {
    /// Stable identifier carried in the `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Deposit { .. } => "deposit",
            Event::Stake { .. } => "stake",
            Event::Unstake { .. } => "unstake",
            Event::Withdraw { .. } => "withdraw",
            Event::ValidatorAdded { .. } => "validator_added",
            Event::ValidatorRemoved { .. } => "validator_removed",
            Event::ValidatorWeightUpdated { .. } => "validator_weight_updated",
            Event::EpochStakeAttempt { .. } => "epoch_stake_attempt",
            Event::EpochStakeSuccess { .. } => "epoch_stake_success",
            Event::EpochStakeFailed { .. } => "epoch_stake_failed",
            Event::EpochUnstakeAttempt { .. } => "epoch_unstake_attempt",
            Event::EpochUnstakeSuccess { .. } => "epoch_unstake_success",
            Event::EpochUnstakeFailed { .. } => "epoch_unstake_failed",
            Event::EpochWithdrawAttempt { .. } => "epoch_withdraw_attempt",
            Event::EpochWithdrawSuccess { .. } => "epoch_withdraw_success",
            Event::EpochWithdrawFailed { .. } => "epoch_withdraw_failed",
            Event::EpochUpdateRewards { .. } => "epoch_update_rewards",
            Event::EpochUpdateRewardsFailed { .. } => "epoch_update_rewards_failed",
            Event::SyncValidatorBalanceSuccess { .. } => "sync_validator_balance_success",
            Event::SyncValidatorBalanceFailedCantGetAccount { .. } => {
                "sync_validator_balance_failed_cant_get_account"
            }
            Event::SyncValidatorBalanceFailedLargeDiff { .. } => {
                "sync_validator_balance_failed_large_diff"
            }
        }
    }

    /// Failure branches are logged at warn level.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::EpochStakeFailed { .. }
                | Event::EpochUnstakeFailed { .. }
                | Event::EpochWithdrawFailed { .. }
                | Event::EpochUpdateRewardsFailed { .. }
                | Event::SyncValidatorBalanceFailedCantGetAccount { .. }
                | Event::SyncValidatorBalanceFailedLargeDiff { .. }
        )
    }

    /// Serialized log line: `EVENT_JSON:{...}`.
    pub fn to_log_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("{}{}", EVENT_PREFIX, json),
            // Plain string/u64 fields only; keep the identifier even if encoding fails
            Err(_) => format!("{}{{\"event\":\"{}\"}}", EVENT_PREFIX, self.name()),
        }
    }
}
