// ─────────────────────────────────────────────────────────────────
// Balance Reconciler
// ─────────────────────────────────────────────────────────────────
// Runs after every delegate action:
//   failed action      → balances untouched, failure event, pending cleared
//   read-back failed   → keep the optimistic value, cant_get_account event
//   |diff| > tolerance → keep the optimistic value, large_diff event
//   |diff| ≤ tolerance → adopt the report, book the drift
// `pending` is cleared on every branch.
// ─────────────────────────────────────────────────────────────────

use lstake_core::{Balance, Event, StakingLedger};
use serde::Serialize;

use crate::pool_client::{PoolAccount, PoolError};

/// What the reconciler did with a validator's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Report within tolerance; signed drift applied to staked/unstaked
    Adopted { staked_drift: i128, unstaked_drift: i128 },
    /// Read-back failed; optimistic value kept
    CantGetAccount,
    /// Report diverged beyond tolerance; optimistic value kept
    LargeDiff,
    /// Validator no longer registered
    ValidatorMissing,
}

fn abs_diff(a: Balance, b: Balance) -> Balance {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

fn signed_diff(reported: Balance, expected: Balance) -> i128 {
    if reported >= expected {
        (reported - expected) as i128
    } else {
        -((expected - reported) as i128)
    }
}

/// Compare the validator record with `report` and settle it. Always clears `pending`.
pub fn sync_validator_balance(
    ledger: &mut StakingLedger,
    validator_id: &str,
    report: Result<PoolAccount, PoolError>,
) -> SyncOutcome {
    let max_diff = ledger.max_sync_balance_diff;
    let (expected_staked, expected_unstaked) = match ledger.validator(validator_id) {
        Ok(v) => (v.staked_amount, v.unstaked_amount),
        Err(_) => return SyncOutcome::ValidatorMissing,
    };

    let outcome = match report {
        Err(err) => {
            ledger.emit(Event::SyncValidatorBalanceFailedCantGetAccount {
                validator_id: validator_id.to_string(),
                error: err.to_string(),
            });
            SyncOutcome::CantGetAccount
        }
        Ok(account) => {
            let staked_diff = abs_diff(account.staked_balance, expected_staked);
            let unstaked_diff = abs_diff(account.unstaked_balance, expected_unstaked);

            if staked_diff > max_diff || unstaked_diff > max_diff {
                ledger.emit(Event::SyncValidatorBalanceFailedLargeDiff {
                    validator_id: validator_id.to_string(),
                    expected_staked,
                    reported_staked: account.staked_balance,
                    expected_unstaked,
                    reported_unstaked: account.unstaked_balance,
                });
                SyncOutcome::LargeDiff
            } else {
                let staked_drift = signed_diff(account.staked_balance, expected_staked);
                let unstaked_drift = signed_diff(account.unstaked_balance, expected_unstaked);
                if let Ok(v) = ledger.validator_mut(validator_id) {
                    v.staked_amount = account.staked_balance;
                    v.unstaked_amount = account.unstaked_balance;
                }
                // Drift is bounded by the tolerance, so the i128 sum cannot overflow
                ledger.totals.reconciled_drift += staked_drift + unstaked_drift;
                ledger.emit(Event::SyncValidatorBalanceSuccess {
                    validator_id: validator_id.to_string(),
                    staked_amount: account.staked_balance,
                    unstaked_amount: account.unstaked_balance,
                });
                SyncOutcome::Adopted {
                    staked_drift,
                    unstaked_drift,
                }
            }
        }
    };

    clear_pending(ledger, validator_id);
    outcome
}

/// Failure branch of a delegate action: log it, leave balances alone, unlock.
pub fn record_action_failure(ledger: &mut StakingLedger, validator_id: &str, event: Event) {
    ledger.emit(event);
    clear_pending(ledger, validator_id);
}

pub(crate) fn clear_pending(ledger: &mut StakingLedger, validator_id: &str) {
    if let Ok(v) = ledger.validator_mut(validator_id) {
        v.pending = false;
    }
}
