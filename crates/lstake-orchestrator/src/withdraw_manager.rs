// ─────────────────────────────────────────────────────────────────
// Withdraw Manager
// ─────────────────────────────────────────────────────────────────
// A validator's unstaked batch matures once
//   current_epoch − unstake_start_epoch ≥ num_epochs_to_unlock
// Withdrawing before that is a precondition error and never reaches the
// pool. On success the batch moves back into the undeployed pool.
// ─────────────────────────────────────────────────────────────────

use lstake_core::{Balance, Event, StakingError, StakingLedger};

use crate::pool_client::PoolError;
use crate::reconciler::record_action_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawPlan {
    pub validator_id: String,
    pub amount: Balance,
}

/// Validators holding a matured unstaked batch with no call in flight.
pub fn matured_validators(ledger: &StakingLedger) -> Vec<String> {
    let epoch = ledger.epoch_height;
    let unlock = ledger.num_epochs_to_unlock;
    ledger
        .validators
        .values()
        .filter(|v| !v.pending && v.unstaked_amount > 0 && v.is_unstake_matured(epoch, unlock))
        .map(|v| v.validator_id.clone())
        .collect()
}

/// Plan phase. `Ok(None)` when there is nothing to withdraw or a call is in
/// flight; `Err` for an unknown or not-yet-matured validator.
pub fn plan_epoch_withdraw(
    ledger: &mut StakingLedger,
    validator_id: &str,
) -> Result<Option<WithdrawPlan>, StakingError> {
    let epoch = ledger.epoch_height;
    let unlock = ledger.num_epochs_to_unlock;
    let v = ledger.validator_mut(validator_id)?;

    if v.pending || v.unstaked_amount == 0 {
        return Ok(None);
    }
    if !v.is_unstake_matured(epoch, unlock) {
        return Err(StakingError::ValidatorUnstakeNotMatured {
            validator_id: validator_id.to_string(),
            available_epoch: v.unstake_available_epoch(unlock),
        });
    }

    v.pending = true;
    let amount = v.unstaked_amount;
    ledger.emit(Event::EpochWithdrawAttempt {
        validator_id: validator_id.to_string(),
        amount,
    });
    Ok(Some(WithdrawPlan {
        validator_id: validator_id.to_string(),
        amount,
    }))
}

/// Apply phase: on success shrink the validator's unstaked amount and credit
/// the undeployed pool; on failure nothing moves.
pub fn apply_withdraw_result(
    ledger: &mut StakingLedger,
    plan: &WithdrawPlan,
    result: Result<(), PoolError>,
) -> bool {
    match result {
        Ok(()) => {
            if let Ok(v) = ledger.validator_mut(&plan.validator_id) {
                v.on_withdraw_success(plan.amount);
            }
            ledger.totals.undeployed_pool += plan.amount;
            ledger.emit(Event::EpochWithdrawSuccess {
                validator_id: plan.validator_id.clone(),
                amount: plan.amount,
            });
            true
        }
        Err(err) => {
            record_action_failure(
                ledger,
                &plan.validator_id,
                Event::EpochWithdrawFailed {
                    validator_id: plan.validator_id.clone(),
                    amount: plan.amount,
                    error: err.to_string(),
                },
            );
            false
        }
    }
}
