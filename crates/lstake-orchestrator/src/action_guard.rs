// ─────────────────────────────────────────────────────────────────
// In-flight Action Guard
// ─────────────────────────────────────────────────────────────────
// Created right after a plan step locks a validator. If the trigger
// future is dropped before it settles (caller timeout, select!, task
// abort), Drop releases the reservation, clears `pending` and records
// the action as failed, so the validator is eligible again next epoch.
// ─────────────────────────────────────────────────────────────────

use lstake_core::{Balance, Event, StakingLedger};
use std::sync::{Arc, Mutex};

use crate::reconciler::{clear_pending, record_action_failure};
use crate::safe_lock;

const CANCELLED: &str = "epoch action cancelled before it settled";

/// The delegate action a guard is covering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GuardedAction {
    Stake(Balance),
    Unstake(Balance),
    Withdraw(Balance),
    UpdateRewards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Planned, result not yet applied
    Planned,
    /// Applied, read-back not yet settled
    Applied,
}

pub(crate) struct ActionGuard {
    ledger: Arc<Mutex<StakingLedger>>,
    validator_id: String,
    action: GuardedAction,
    phase: Option<Phase>,
}

impl ActionGuard {
    pub(crate) fn new(
        ledger: &Arc<Mutex<StakingLedger>>,
        validator_id: &str,
        action: GuardedAction,
    ) -> Self {
        Self {
            ledger: Arc::clone(ledger),
            validator_id: validator_id.to_string(),
            action,
            phase: Some(Phase::Planned),
        }
    }

    /// The action's result is booked; only the read-back is outstanding.
    pub(crate) fn applied(&mut self) {
        if self.phase.is_some() {
            self.phase = Some(Phase::Applied);
        }
    }

    /// Nothing left to undo.
    pub(crate) fn disarm(&mut self) {
        self.phase = None;
    }

    fn failure_event(&self) -> Event {
        let validator_id = self.validator_id.clone();
        let error = CANCELLED.to_string();
        match self.action {
            GuardedAction::Stake(amount) => Event::EpochStakeFailed {
                validator_id,
                amount,
                error,
            },
            GuardedAction::Unstake(amount) => Event::EpochUnstakeFailed {
                validator_id,
                amount,
                error,
            },
            GuardedAction::Withdraw(amount) => Event::EpochWithdrawFailed {
                validator_id,
                amount,
                error,
            },
            GuardedAction::UpdateRewards => Event::EpochUpdateRewardsFailed {
                validator_id,
                error,
            },
        }
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        let Some(phase) = self.phase.take() else {
            return;
        };
        let mut ledger = safe_lock(&self.ledger);
        match phase {
            Phase::Planned => {
                match self.action {
                    GuardedAction::Stake(amount) => {
                        ledger.totals.reserved_for_stake =
                            ledger.totals.reserved_for_stake.saturating_sub(amount);
                    }
                    GuardedAction::Unstake(amount) => {
                        ledger.totals.reserved_for_unstake =
                            ledger.totals.reserved_for_unstake.saturating_sub(amount);
                    }
                    GuardedAction::Withdraw(_) | GuardedAction::UpdateRewards => {}
                }
                let event = self.failure_event();
                record_action_failure(&mut ledger, &self.validator_id, event);
            }
            Phase::Applied => {
                ledger.emit(Event::SyncValidatorBalanceFailedCantGetAccount {
                    validator_id: self.validator_id.clone(),
                    error: CANCELLED.to_string(),
                });
                clear_pending(&mut ledger, &self.validator_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stake_scheduler::plan_epoch_stake;
    use lstake_core::{tokens, OrchestratorConfig};

    fn shared_ledger() -> Arc<Mutex<StakingLedger>> {
        let mut ledger = StakingLedger::new(&OrchestratorConfig::new("owner"));
        ledger.add_validator("owner", "v1", 10).unwrap();
        Arc::new(Mutex::new(ledger))
    }

    #[test]
    fn test_dropped_plan_releases_reservation() {
        let ledger = shared_ledger();
        let plan = plan_epoch_stake(&mut safe_lock(&ledger)).unwrap();
        let guard = ActionGuard::new(&ledger, "v1", GuardedAction::Stake(plan.amount));
        assert_eq!(safe_lock(&ledger).totals.reserved_for_stake, tokens(10));

        drop(guard);
        let l = safe_lock(&ledger);
        assert_eq!(l.totals.reserved_for_stake, 0);
        assert!(!l.validator("v1").unwrap().pending);
        assert!(l.has_log("epoch_stake_failed"));
        assert!(l.has_log(CANCELLED));
    }

    #[test]
    fn test_dropped_after_apply_only_unlocks() {
        let ledger = shared_ledger();
        safe_lock(&ledger).validator_mut("v1").unwrap().pending = true;
        let mut guard = ActionGuard::new(&ledger, "v1", GuardedAction::Withdraw(5));
        guard.applied();

        drop(guard);
        let l = safe_lock(&ledger);
        assert!(!l.validator("v1").unwrap().pending);
        assert!(!l.has_log("epoch_withdraw_failed"));
        assert!(l.has_log("sync_validator_balance_failed_cant_get_account"));
    }

    #[test]
    fn test_disarmed_guard_is_silent() {
        let ledger = shared_ledger();
        safe_lock(&ledger).validator_mut("v1").unwrap().pending = true;
        let mut guard = ActionGuard::new(&ledger, "v1", GuardedAction::UpdateRewards);
        guard.disarm();
        guard.applied();

        drop(guard);
        let l = safe_lock(&ledger);
        assert!(l.validator("v1").unwrap().pending);
        assert!(!l.has_log("epoch_update_rewards_failed"));
    }
}
