// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LSTAKE - ORCHESTRATOR
//
// Epoch-driven delegation engine on top of lstake-core:
// - Stake/unstake schedulers pick one validator per epoch action by weight
// - Withdraw manager pulls matured unstaked funds back into the pool
// - Reconciler checks every successful action against the validator's report
// - Reward updates credit validator growth to stakers
//
// Every delegate action is two-phase: plan (check-and-set `pending`,
// reserve funds) under the ledger lock, await the pool call without the
// lock, then apply + reconcile under the lock again.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod action_guard;
#[cfg(any(test, feature = "mock"))]
pub mod mock_pool;
pub mod orchestrator;
pub mod pool_client;
pub mod reconciler;
pub mod rewards;
pub mod stake_scheduler;
pub mod unstake_scheduler;
pub mod withdraw_manager;

#[cfg(any(test, feature = "mock"))]
pub use mock_pool::{MockStakingPool, PoolCall};
pub use orchestrator::{Orchestrator, OrchestratorSummary};
pub use pool_client::{call_with_timeout, PoolAccount, PoolError, ValidatorPoolClient};
pub use reconciler::SyncOutcome;

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Result of an epoch trigger. Failures inside epoch actions are reported
/// here instead of as `Err`, so one validator's trouble never aborts the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochOutcome {
    /// Nothing eligible to act on
    Idle,
    /// The external call succeeded
    Completed,
    /// The external call was attempted and failed (or timed out)
    Failed,
}

impl EpochOutcome {
    pub fn is_success(&self) -> bool {
        *self == EpochOutcome::Completed
    }

    pub fn is_failure(&self) -> bool {
        *self == EpochOutcome::Failed
    }

    pub fn is_idle(&self) -> bool {
        *self == EpochOutcome::Idle
    }
}

/// Lock a mutex, recovering from poisoning instead of cascading the panic.
pub(crate) fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
