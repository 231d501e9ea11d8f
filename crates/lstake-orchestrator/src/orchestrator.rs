use futures::future::join_all;
use lstake_core::{
    Balance, EpochHeight, OrchestratorConfig, StakingError, StakingLedger, UserLedgerEntry,
    ValidatorInfo,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::action_guard::{ActionGuard, GuardedAction};
use crate::pool_client::{call_with_timeout, ValidatorPoolClient};
use crate::reconciler::{sync_validator_balance, SyncOutcome};
use crate::{rewards, safe_lock, stake_scheduler, unstake_scheduler, withdraw_manager, EpochOutcome};

/// Aggregate view for dashboards and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorSummary {
    pub epoch_height: EpochHeight,
    #[serde(with = "lstake_core::u128_str")]
    pub total_staked: Balance,
    #[serde(with = "lstake_core::u128_str")]
    pub total_unstaked: Balance,
    #[serde(with = "lstake_core::u128_str")]
    pub undeployed_pool: Balance,
    #[serde(with = "lstake_core::u128_str")]
    pub delegated_staked: Balance,
    #[serde(with = "lstake_core::u128_str")]
    pub delegated_unstaked: Balance,
    #[serde(with = "lstake_core::i128_str")]
    pub reconciled_drift: i128,
    pub validator_count: usize,
    pub total_weight: u128,
}

/// Liquid-staking orchestrator: the staking ledger plus a handle to the
/// validator pools it delegates to.
///
/// The ledger mutex is held only for synchronous plan/apply steps, never
/// across a pool call, so triggers for different validators can overlap
/// while each validator sees at most one call at a time.
pub struct Orchestrator {
    ledger: Arc<Mutex<StakingLedger>>,
    client: Arc<dyn ValidatorPoolClient>,
    call_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: &OrchestratorConfig, client: Arc<dyn ValidatorPoolClient>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(StakingLedger::new(config))),
            client,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StakingLedger> {
        safe_lock(&self.ledger)
    }

    /// Shared handle to the ledger (for persistence or inspection).
    pub fn ledger(&self) -> Arc<Mutex<StakingLedger>> {
        Arc::clone(&self.ledger)
    }

    // ─────────────────────────────────────────────────────────────
    // ADMIN
    // ─────────────────────────────────────────────────────────────

    pub fn add_validator(&self, caller: &str, validator_id: &str, weight: u32) -> Result<(), StakingError> {
        self.lock().add_validator(caller, validator_id, weight)
    }

    pub fn remove_validator(&self, caller: &str, validator_id: &str) -> Result<(), StakingError> {
        self.lock().remove_validator(caller, validator_id)
    }

    pub fn update_weight(&self, caller: &str, validator_id: &str, weight: u32) -> Result<(), StakingError> {
        self.lock().update_weight(caller, validator_id, weight)
    }

    pub fn set_epoch_height(&self, epoch: EpochHeight) {
        self.lock().set_epoch_height(epoch);
    }

    pub fn epoch_height(&self) -> EpochHeight {
        self.lock().epoch_height
    }

    // ─────────────────────────────────────────────────────────────
    // USER OPERATIONS
    // ─────────────────────────────────────────────────────────────

    pub fn deposit(&self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        self.lock().deposit(account_id, amount)
    }

    pub fn deposit_and_stake(&self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        self.lock().deposit_and_stake(account_id, amount)
    }

    pub fn stake(&self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        self.lock().stake(account_id, amount)
    }

    pub fn stake_all(&self, account_id: &str) -> Result<Balance, StakingError> {
        self.lock().stake_all(account_id)
    }

    pub fn unstake(&self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        self.lock().unstake(account_id, amount)
    }

    pub fn unstake_all(&self, account_id: &str) -> Result<Balance, StakingError> {
        self.lock().unstake_all(account_id)
    }

    pub fn withdraw(&self, account_id: &str, amount: Balance) -> Result<Balance, StakingError> {
        self.lock().withdraw(account_id, amount)
    }

    pub fn withdraw_all(&self, account_id: &str) -> Result<Balance, StakingError> {
        self.lock().withdraw_all(account_id)
    }

    // ─────────────────────────────────────────────────────────────
    // EPOCH TRIGGERS
    // ─────────────────────────────────────────────────────────────

    /// Delegate undeployed stake to the most under-allocated validator.
    pub async fn epoch_stake(&self) -> EpochOutcome {
        let plan = {
            let mut ledger = self.lock();
            stake_scheduler::plan_epoch_stake(&mut ledger)
        };
        let Some(plan) = plan else {
            return EpochOutcome::Idle;
        };
        let mut guard =
            ActionGuard::new(&self.ledger, &plan.validator_id, GuardedAction::Stake(plan.amount));

        let result = call_with_timeout(
            &plan.validator_id,
            self.call_timeout,
            self.client.delegate_stake(&plan.validator_id, plan.amount),
        )
        .await;

        let succeeded = {
            let mut ledger = self.lock();
            stake_scheduler::apply_stake_result(&mut ledger, &plan, result)
        };
        if !succeeded {
            guard.disarm();
            return EpochOutcome::Failed;
        }
        guard.applied();
        self.reconcile(&plan.validator_id).await;
        guard.disarm();
        EpochOutcome::Completed
    }

    /// Pull stake back from the most over-allocated validator.
    pub async fn epoch_unstake(&self) -> EpochOutcome {
        let plan = {
            let mut ledger = self.lock();
            unstake_scheduler::plan_epoch_unstake(&mut ledger)
        };
        let Some(plan) = plan else {
            return EpochOutcome::Idle;
        };
        let mut guard =
            ActionGuard::new(&self.ledger, &plan.validator_id, GuardedAction::Unstake(plan.amount));

        let result = call_with_timeout(
            &plan.validator_id,
            self.call_timeout,
            self.client.delegate_unstake(&plan.validator_id, plan.amount),
        )
        .await;

        let succeeded = {
            let mut ledger = self.lock();
            unstake_scheduler::apply_unstake_result(&mut ledger, &plan, result)
        };
        if !succeeded {
            guard.disarm();
            return EpochOutcome::Failed;
        }
        guard.applied();
        self.reconcile(&plan.validator_id).await;
        guard.disarm();
        EpochOutcome::Completed
    }

    /// Withdraw a validator's matured unstaked batch into the undeployed pool.
    pub async fn epoch_withdraw(&self, validator_id: &str) -> Result<EpochOutcome, StakingError> {
        let plan = {
            let mut ledger = self.lock();
            withdraw_manager::plan_epoch_withdraw(&mut ledger, validator_id)?
        };
        let Some(plan) = plan else {
            return Ok(EpochOutcome::Idle);
        };
        let mut guard =
            ActionGuard::new(&self.ledger, validator_id, GuardedAction::Withdraw(plan.amount));

        let result = call_with_timeout(
            validator_id,
            self.call_timeout,
            self.client.delegate_withdraw(validator_id, plan.amount),
        )
        .await;

        let succeeded = {
            let mut ledger = self.lock();
            withdraw_manager::apply_withdraw_result(&mut ledger, &plan, result)
        };
        if !succeeded {
            guard.disarm();
            return Ok(EpochOutcome::Failed);
        }
        guard.applied();
        self.reconcile(validator_id).await;
        guard.disarm();
        Ok(EpochOutcome::Completed)
    }

    /// Run `epoch_withdraw` concurrently on every validator whose batch has matured.
    pub async fn epoch_withdraw_all(&self) -> Vec<(String, Result<EpochOutcome, StakingError>)> {
        let matured = withdraw_manager::matured_validators(&self.lock());
        let outcomes = join_all(matured.iter().map(|id| self.epoch_withdraw(id))).await;
        matured.into_iter().zip(outcomes).collect()
    }

    /// Credit rewards accrued at `validator_id` since the last update.
    pub async fn epoch_update_rewards(&self, validator_id: &str) -> Result<EpochOutcome, StakingError> {
        let plan = {
            let mut ledger = self.lock();
            rewards::plan_update_rewards(&mut ledger, validator_id)?
        };
        let Some(plan) = plan else {
            return Ok(EpochOutcome::Idle);
        };
        let mut guard = ActionGuard::new(&self.ledger, validator_id, GuardedAction::UpdateRewards);

        let report = call_with_timeout(
            validator_id,
            self.call_timeout,
            self.client.query_account(validator_id),
        )
        .await;

        let answered = {
            let mut ledger = self.lock();
            rewards::apply_rewards_result(&mut ledger, &plan, report)
        };
        guard.disarm();
        Ok(if answered {
            EpochOutcome::Completed
        } else {
            EpochOutcome::Failed
        })
    }

    /// Read back the validator's balances and settle its record.
    async fn reconcile(&self, validator_id: &str) -> SyncOutcome {
        let report = call_with_timeout(
            validator_id,
            self.call_timeout,
            self.client.query_account(validator_id),
        )
        .await;
        let mut ledger = self.lock();
        sync_validator_balance(&mut ledger, validator_id, report)
    }

    // ─────────────────────────────────────────────────────────────
    // VIEWS
    // ─────────────────────────────────────────────────────────────

    pub fn get_validator(&self, validator_id: &str) -> Option<ValidatorInfo> {
        self.lock().get_validator(validator_id)
    }

    pub fn get_validators(&self) -> Vec<ValidatorInfo> {
        self.lock().get_validators()
    }

    pub fn get_account(&self, account_id: &str) -> Option<UserLedgerEntry> {
        self.lock().get_account(account_id)
    }

    pub fn get_account_staked_balance(&self, account_id: &str) -> Balance {
        self.lock().get_account_staked_balance(account_id)
    }

    pub fn get_account_unstaked_balance(&self, account_id: &str) -> Balance {
        self.lock().get_account_unstaked_balance(account_id)
    }

    pub fn get_account_total_balance(&self, account_id: &str) -> Balance {
        self.lock().get_account_total_balance(account_id)
    }

    pub fn get_summary(&self) -> OrchestratorSummary {
        let ledger = self.lock();
        OrchestratorSummary {
            epoch_height: ledger.epoch_height,
            total_staked: ledger.totals.total_staked,
            total_unstaked: ledger.totals.total_unstaked,
            undeployed_pool: ledger.totals.undeployed_pool,
            delegated_staked: ledger.delegated_staked(),
            delegated_unstaked: ledger.delegated_unstaked(),
            reconciled_drift: ledger.totals.reconciled_drift,
            validator_count: ledger.validators.len(),
            total_weight: ledger.total_weight(),
        }
    }

    pub fn state_root(&self) -> String {
        self.lock().compute_state_root()
    }

    pub fn conservation_gap(&self) -> i128 {
        self.lock().conservation_gap()
    }

    pub fn is_quiescent(&self) -> bool {
        self.lock().is_quiescent()
    }

    pub fn logs(&self) -> Vec<String> {
        self.lock().logs().to_vec()
    }

    pub fn drain_logs(&self) -> Vec<String> {
        self.lock().drain_logs()
    }

    pub fn has_log(&self, needle: &str) -> bool {
        self.lock().has_log(needle)
    }
}
