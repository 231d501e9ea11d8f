// ─────────────────────────────────────────────────────────────────
// Reward updates
// ─────────────────────────────────────────────────────────────────
// Once per validator per epoch, read the validator's staked balance and
// treat growth over the recorded amount as rewards. Rewards are adopted
// into the validator record and credited to stakers (owner fee first).
// A failed read leaves the ledger untouched.
// ─────────────────────────────────────────────────────────────────

use lstake_core::{EpochHeight, Event, StakingError, StakingLedger};

use crate::pool_client::{PoolAccount, PoolError};
use crate::reconciler::clear_pending;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardsPlan {
    pub validator_id: String,
    pub epoch: EpochHeight,
}

/// Plan phase. `Ok(None)` when a call is in flight or rewards were already
/// updated this epoch.
pub fn plan_update_rewards(
    ledger: &mut StakingLedger,
    validator_id: &str,
) -> Result<Option<RewardsPlan>, StakingError> {
    let epoch = ledger.epoch_height;
    let v = ledger.validator_mut(validator_id)?;
    if v.pending || v.last_reward_epoch == Some(epoch) {
        return Ok(None);
    }
    v.pending = true;
    Ok(Some(RewardsPlan {
        validator_id: validator_id.to_string(),
        epoch,
    }))
}

/// Apply phase. Returns true when the validator answered.
pub fn apply_rewards_result(
    ledger: &mut StakingLedger,
    plan: &RewardsPlan,
    report: Result<PoolAccount, PoolError>,
) -> bool {
    let answered = match report {
        Err(err) => {
            ledger.emit(Event::EpochUpdateRewardsFailed {
                validator_id: plan.validator_id.clone(),
                error: err.to_string(),
            });
            false
        }
        Ok(account) => {
            let old_balance = match ledger.validator(&plan.validator_id) {
                Ok(v) => v.staked_amount,
                Err(_) => return false,
            };
            // A shrinking report is not a reward; the record is left for the reconciler
            let new_balance = account.staked_balance.max(old_balance);
            let rewards = new_balance - old_balance;

            if let Ok(v) = ledger.validator_mut(&plan.validator_id) {
                v.staked_amount = new_balance;
                v.last_reward_epoch = Some(plan.epoch);
            }
            let fee = ledger.distribute_rewards(rewards);
            ledger.emit(Event::EpochUpdateRewards {
                validator_id: plan.validator_id.clone(),
                old_balance,
                new_balance,
                rewards,
                fee,
            });
            true
        }
    };

    clear_pending(ledger, &plan.validator_id);
    answered
}
