// ─────────────────────────────────────────────────────────────────
// Validator Record — orchestrator's view of one validator pool
// ─────────────────────────────────────────────────────────────────
// staked + unstaked only shrinks through a successful withdraw (or an
// adopted reconciliation report). Stake/unstake shift between the two.
// `pending` is the per-validator lock: at most one call in flight.
// ─────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::{u128_str, Balance, EpochHeight};

/// Per-validator ledger entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRecord {
    pub validator_id: String,
    /// Relative share of the total stake this validator should hold
    pub weight: u32,
    /// Principal the orchestrator believes is staked at the pool
    #[serde(with = "u128_str")]
    pub staked_amount: Balance,
    /// Principal unstaked at the pool but not yet withdrawn
    #[serde(with = "u128_str")]
    pub unstaked_amount: Balance,
    /// Epoch the current unstaked batch started maturing
    pub unstake_start_epoch: EpochHeight,
    /// Epoch of the last stake/unstake attempt
    pub last_action_epoch: Option<EpochHeight>,
    /// Epoch of the last reward update
    #[serde(default)]
    pub last_reward_epoch: Option<EpochHeight>,
    /// True while a call to this validator is in flight
    #[serde(default)]
    pub pending: bool,
}

impl ValidatorRecord {
    pub fn new(validator_id: String, weight: u32) -> Self {
        Self {
            validator_id,
            weight,
            staked_amount: 0,
            unstaked_amount: 0,
            unstake_start_epoch: 0,
            last_action_epoch: None,
            last_reward_epoch: None,
            pending: false,
        }
    }

    pub fn total_balance(&self) -> Balance {
        self.staked_amount.saturating_add(self.unstaked_amount)
    }

    pub fn is_empty(&self) -> bool {
        self.staked_amount == 0 && self.unstaked_amount == 0
    }

    /// Share of `total_staked` this validator should hold: total × weight / total_weight.
    /// Split as (q × w) + (r × w / W) so the product never overflows.
    pub fn target_amount(&self, total_staked: Balance, total_weight: u128) -> Balance {
        if total_weight == 0 || self.weight == 0 {
            return 0;
        }
        let weight = self.weight as u128;
        let quotient = total_staked / total_weight;
        let remainder = total_staked % total_weight;
        quotient
            .saturating_mul(weight)
            .saturating_add(remainder * weight / total_weight)
    }

    /// How far below its target this validator sits.
    pub fn deficit(&self, target: Balance) -> Balance {
        target.saturating_sub(self.staked_amount)
    }

    /// How far above its target this validator sits.
    pub fn surplus(&self, target: Balance) -> Balance {
        self.staked_amount.saturating_sub(target)
    }

    /// Eligible for a stake/unstake action this epoch: no call in flight and
    /// not already acted on at `epoch`.
    pub fn can_act(&self, epoch: EpochHeight) -> bool {
        !self.pending && self.last_action_epoch != Some(epoch)
    }

    /// First epoch at which the current unstaked batch can be withdrawn.
    pub fn unstake_available_epoch(&self, num_epochs_to_unlock: EpochHeight) -> EpochHeight {
        self.unstake_start_epoch.saturating_add(num_epochs_to_unlock)
    }

    pub fn is_unstake_matured(&self, epoch: EpochHeight, num_epochs_to_unlock: EpochHeight) -> bool {
        epoch >= self.unstake_available_epoch(num_epochs_to_unlock)
    }

    /// Optimistic transition after a successful delegated stake.
    pub fn on_stake_success(&mut self, amount: Balance) {
        self.staked_amount = self.staked_amount.saturating_add(amount);
    }

    /// Optimistic transition after a successful delegated unstake.
    /// Restarts the maturity clock for the whole unstaked balance.
    pub fn on_unstake_success(&mut self, amount: Balance, epoch: EpochHeight) {
        let moved = amount.min(self.staked_amount);
        self.staked_amount -= moved;
        self.unstaked_amount = self.unstaked_amount.saturating_add(moved);
        self.unstake_start_epoch = epoch;
    }

    /// Transition after a successful delegated withdraw.
    pub fn on_withdraw_success(&mut self, amount: Balance) {
        self.unstaked_amount = self.unstaked_amount.saturating_sub(amount);
    }
}

/// Read-only view returned by `get_validator`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub validator_id: String,
    pub weight: u32,
    #[serde(with = "u128_str")]
    pub staked_amount: Balance,
    #[serde(with = "u128_str")]
    pub unstaked_amount: Balance,
    pub unstake_start_epoch: EpochHeight,
    pub pending: bool,
}

impl From<&ValidatorRecord> for ValidatorInfo {
    fn from(v: &ValidatorRecord) -> Self {
        Self {
            validator_id: v.validator_id.clone(),
            weight: v.weight,
            staked_amount: v.staked_amount,
            unstaked_amount: v.unstaked_amount,
            unstake_start_epoch: v.unstake_start_epoch,
            pending: v.pending,
        }
    }
}
