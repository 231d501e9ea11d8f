// ─────────────────────────────────────────────────────────────────
// Epoch Unstake Scheduler
// ─────────────────────────────────────────────────────────────────
// Runs when users have unstaked more than is already coming back:
//   unstake demand = Σ staked_amount − reserved_for_unstake − total_staked
// Picks the eligible validator with the largest surplus over its target;
// if none is over target, falls back to the one holding the most stake.
// ─────────────────────────────────────────────────────────────────

use lstake_core::{Balance, EpochHeight, Event, StakingLedger};

use crate::pool_client::PoolError;
use crate::reconciler::record_action_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstakePlan {
    pub validator_id: String,
    pub amount: Balance,
    pub epoch: EpochHeight,
}

/// Eligible validator to unstake from, and the most it should give back.
pub fn select_unstake_candidate(ledger: &StakingLedger) -> Option<(String, Balance)> {
    let epoch = ledger.epoch_height;
    let total_staked = ledger.totals.total_staked;
    let total_weight = ledger.total_weight();

    let mut by_surplus: Option<(&String, Balance)> = None;
    let mut by_stake: Option<(&String, Balance)> = None;
    for (id, v) in &ledger.validators {
        if !v.can_act(epoch) || v.staked_amount == 0 {
            continue;
        }
        let surplus = v.surplus(v.target_amount(total_staked, total_weight));
        if surplus > 0 && by_surplus.map_or(true, |(_, s)| surplus > s) {
            by_surplus = Some((id, surplus));
        }
        if by_stake.map_or(true, |(_, s)| v.staked_amount > s) {
            by_stake = Some((id, v.staked_amount));
        }
    }
    by_surplus
        .or(by_stake)
        .map(|(id, amount)| (id.clone(), amount))
}

/// Plan phase: lock the chosen validator, stamp the epoch, reserve the amount.
pub fn plan_epoch_unstake(ledger: &mut StakingLedger) -> Option<UnstakePlan> {
    let demand = ledger.unstake_demand();
    if demand == 0 {
        return None;
    }
    let (validator_id, available) = select_unstake_candidate(ledger)?;
    let amount = demand.min(available);
    let epoch = ledger.epoch_height;

    let v = ledger.validator_mut(&validator_id).ok()?;
    v.pending = true;
    v.last_action_epoch = Some(epoch);
    ledger.totals.reserved_for_unstake += amount;

    ledger.emit(Event::EpochUnstakeAttempt {
        validator_id: validator_id.clone(),
        amount,
    });
    Some(UnstakePlan {
        validator_id,
        amount,
        epoch,
    })
}

/// Apply phase: release the reservation; on success move the amount to
/// unstaked and restart the validator's maturity clock.
pub fn apply_unstake_result(
    ledger: &mut StakingLedger,
    plan: &UnstakePlan,
    result: Result<(), PoolError>,
) -> bool {
    ledger.totals.reserved_for_unstake =
        ledger.totals.reserved_for_unstake.saturating_sub(plan.amount);

    match result {
        Ok(()) => {
            if let Ok(v) = ledger.validator_mut(&plan.validator_id) {
                v.on_unstake_success(plan.amount, plan.epoch);
            }
            ledger.emit(Event::EpochUnstakeSuccess {
                validator_id: plan.validator_id.clone(),
                amount: plan.amount,
            });
            true
        }
        Err(err) => {
            record_action_failure(
                ledger,
                &plan.validator_id,
                Event::EpochUnstakeFailed {
                    validator_id: plan.validator_id.clone(),
                    amount: plan.amount,
                    error: err.to_string(),
                },
            );
            false
        }
    }
}
