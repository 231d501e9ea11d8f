// ─────────────────────────────────────────────────────────────────
// Epoch Stake Scheduler
// ─────────────────────────────────────────────────────────────────
// Picks the under-allocated validator with the largest deficit
//   target = total_staked × weight / total_weight
//   deficit = target − staked_amount
// among validators that are not pending and not acted on this epoch,
// and delegates min(deficit, stake demand, available undeployed funds).
// Ties go to the first validator id in sorted order.
//
// Targets round down, so up to one base unit per validator can be left
// over once every deficit is zero. That remainder goes to the eligible
// validator with the highest weight.
// ─────────────────────────────────────────────────────────────────

use lstake_core::{Balance, EpochHeight, Event, StakingLedger};

use crate::pool_client::PoolError;
use crate::reconciler::record_action_failure;

/// A stake call reserved under the ledger lock, waiting to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakePlan {
    pub validator_id: String,
    pub amount: Balance,
    pub epoch: EpochHeight,
}

/// Eligible validator with the largest positive deficit, and that deficit.
pub fn select_stake_candidate(ledger: &StakingLedger) -> Option<(String, Balance)> {
    let epoch = ledger.epoch_height;
    let total_staked = ledger.totals.total_staked;
    let total_weight = ledger.total_weight();

    let mut best: Option<(&String, Balance)> = None;
    for (id, v) in &ledger.validators {
        if !v.can_act(epoch) {
            continue;
        }
        let deficit = v.deficit(v.target_amount(total_staked, total_weight));
        if deficit == 0 {
            continue;
        }
        if best.map_or(true, |(_, d)| deficit > d) {
            best = Some((id, deficit));
        }
    }
    best.map(|(id, deficit)| (id.clone(), deficit))
}

/// Eligible validator with the highest weight, used to place the rounding
/// remainder. Only applies when no validator (eligible or not) is below target.
pub fn select_remainder_candidate(ledger: &StakingLedger) -> Option<String> {
    let epoch = ledger.epoch_height;
    let total_staked = ledger.totals.total_staked;
    let total_weight = ledger.total_weight();

    let any_deficit = ledger
        .validators
        .values()
        .any(|v| v.deficit(v.target_amount(total_staked, total_weight)) > 0);
    if any_deficit {
        return None;
    }

    let mut best: Option<(&String, u32)> = None;
    for (id, v) in &ledger.validators {
        if !v.can_act(epoch) || v.weight == 0 {
            continue;
        }
        if best.map_or(true, |(_, w)| v.weight > w) {
            best = Some((id, v.weight));
        }
    }
    best.map(|(id, _)| id.clone())
}

/// Plan phase: choose a validator, lock it (`pending`), stamp the epoch and
/// reserve the funds. Returns `None` when there is nothing to stake.
pub fn plan_epoch_stake(ledger: &mut StakingLedger) -> Option<StakePlan> {
    let budget = ledger.stake_demand().min(ledger.available_undeployed());
    if budget == 0 {
        return None;
    }
    let (validator_id, deficit) = select_stake_candidate(ledger)
        .or_else(|| select_remainder_candidate(ledger).map(|id| (id, budget)))?;
    let amount = deficit.min(budget);
    let epoch = ledger.epoch_height;

    let v = ledger.validator_mut(&validator_id).ok()?;
    v.pending = true;
    v.last_action_epoch = Some(epoch);
    ledger.totals.reserved_for_stake += amount;

    ledger.emit(Event::EpochStakeAttempt {
        validator_id: validator_id.clone(),
        amount,
    });
    Some(StakePlan {
        validator_id,
        amount,
        epoch,
    })
}

/// Apply phase: release the reservation and either book the delegated stake
/// (validator stays pending until reconciled) or record the failure.
/// Returns true on success.
pub fn apply_stake_result(
    ledger: &mut StakingLedger,
    plan: &StakePlan,
    result: Result<(), PoolError>,
) -> bool {
    ledger.totals.reserved_for_stake = ledger.totals.reserved_for_stake.saturating_sub(plan.amount);

    match result {
        Ok(()) => {
            if let Ok(v) = ledger.validator_mut(&plan.validator_id) {
                v.on_stake_success(plan.amount);
            }
            ledger.totals.undeployed_pool = ledger.totals.undeployed_pool.saturating_sub(plan.amount);
            ledger.emit(Event::EpochStakeSuccess {
                validator_id: plan.validator_id.clone(),
                amount: plan.amount,
            });
            true
        }
        Err(err) => {
            record_action_failure(
                ledger,
                &plan.validator_id,
                Event::EpochStakeFailed {
                    validator_id: plan.validator_id.clone(),
                    amount: plan.amount,
                    error: err.to_string(),
                },
            );
            false
        }
    }
}
