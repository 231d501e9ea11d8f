// ─────────────────────────────────────────────────────────────────
// In-process validator pools with fault injection
// ─────────────────────────────────────────────────────────────────
// Each validator id gets its own account on first use. Faults are set
// per validator:
//   set_panic            every call (including reads) fails
//   set_get_account_fail only query_account fails
//   set_balance_delta    query_account over-reports by a fixed delta
//   set_hang             calls never answer (exercise the timeout path)
//   set_delay            calls answer after a delay
// add_reward simulates reward accrual on the staked balance.
// ─────────────────────────────────────────────────────────────────

use async_trait::async_trait;
use lstake_core::Balance;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::pool_client::{PoolAccount, PoolError, ValidatorPoolClient};
use crate::safe_lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCall {
    Stake,
    Unstake,
    Withdraw,
    QueryAccount,
}

#[derive(Debug, Clone, Default)]
struct MockValidator {
    staked: Balance,
    unstaked: Balance,
    panic: bool,
    get_account_fail: bool,
    hang: bool,
    delay: Option<Duration>,
    staked_delta: Balance,
    unstaked_delta: Balance,
}

#[derive(Debug, Default)]
pub struct MockStakingPool {
    validators: Mutex<BTreeMap<String, MockValidator>>,
    calls: Mutex<Vec<(String, PoolCall)>>,
}

impl MockStakingPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_validator<R>(&self, validator_id: &str, f: impl FnOnce(&mut MockValidator) -> R) -> R {
        let mut validators = safe_lock(&self.validators);
        f(validators.entry(validator_id.to_string()).or_default())
    }

    pub fn set_panic(&self, validator_id: &str, panic: bool) {
        self.with_validator(validator_id, |v| v.panic = panic);
    }

    pub fn set_get_account_fail(&self, validator_id: &str, fail: bool) {
        self.with_validator(validator_id, |v| v.get_account_fail = fail);
    }

    pub fn set_balance_delta(&self, validator_id: &str, staked_delta: Balance, unstaked_delta: Balance) {
        self.with_validator(validator_id, |v| {
            v.staked_delta = staked_delta;
            v.unstaked_delta = unstaked_delta;
        });
    }

    pub fn set_hang(&self, validator_id: &str, hang: bool) {
        self.with_validator(validator_id, |v| v.hang = hang);
    }

    pub fn set_delay(&self, validator_id: &str, delay: Option<Duration>) {
        self.with_validator(validator_id, |v| v.delay = delay);
    }

    pub fn add_reward(&self, validator_id: &str, amount: Balance) {
        self.with_validator(validator_id, |v| v.staked += amount);
    }

    /// True balances held at the pool (without any reporting delta).
    pub fn balances(&self, validator_id: &str) -> (Balance, Balance) {
        self.with_validator(validator_id, |v| (v.staked, v.unstaked))
    }

    /// Calls received by `validator_id`, in order.
    pub fn calls(&self, validator_id: &str) -> Vec<PoolCall> {
        safe_lock(&self.calls)
            .iter()
            .filter(|(id, _)| id == validator_id)
            .map(|(_, call)| *call)
            .collect()
    }

    /// Common preamble: record the call, then hang/delay/panic as configured.
    async fn enter(&self, validator_id: &str, call: PoolCall) -> Result<(), PoolError> {
        safe_lock(&self.calls).push((validator_id.to_string(), call));
        let (hang, delay, panic) =
            self.with_validator(validator_id, |v| (v.hang, v.delay, v.panic));

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panic {
            return Err(PoolError::Rejected {
                validator_id: validator_id.to_string(),
                reason: "panicked".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ValidatorPoolClient for MockStakingPool {
    async fn delegate_stake(&self, validator_id: &str, amount: Balance) -> Result<(), PoolError> {
        self.enter(validator_id, PoolCall::Stake).await?;
        self.with_validator(validator_id, |v| v.staked += amount);
        Ok(())
    }

    async fn delegate_unstake(&self, validator_id: &str, amount: Balance) -> Result<(), PoolError> {
        self.enter(validator_id, PoolCall::Unstake).await?;
        self.with_validator(validator_id, |v| {
            if v.staked < amount {
                return Err(PoolError::Rejected {
                    validator_id: validator_id.to_string(),
                    reason: "not enough staked balance".to_string(),
                });
            }
            v.staked -= amount;
            v.unstaked += amount;
            Ok(())
        })
    }

    async fn delegate_withdraw(&self, validator_id: &str, amount: Balance) -> Result<(), PoolError> {
        self.enter(validator_id, PoolCall::Withdraw).await?;
        self.with_validator(validator_id, |v| {
            if v.unstaked < amount {
                return Err(PoolError::Rejected {
                    validator_id: validator_id.to_string(),
                    reason: "not enough unstaked balance".to_string(),
                });
            }
            v.unstaked -= amount;
            Ok(())
        })
    }

    async fn query_account(&self, validator_id: &str) -> Result<PoolAccount, PoolError> {
        self.enter(validator_id, PoolCall::QueryAccount).await?;
        self.with_validator(validator_id, |v| {
            if v.get_account_fail {
                return Err(PoolError::Unreachable(validator_id.to_string()));
            }
            Ok(PoolAccount {
                staked_balance: v.staked + v.staked_delta,
                unstaked_balance: v.unstaked + v.unstaked_delta,
            })
        })
    }
}
