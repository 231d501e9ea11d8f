// ─────────────────────────────────────────────────────────────────
// Staking Ledger — user accounts, validator records, aggregate totals
// ─────────────────────────────────────────────────────────────────
// Conservation (checked by `conservation_gap`, zero at quiescent points):
//
//   Σ user(staked + unstaked) + reconciled_drift
//       == Σ validator(staked + unstaked) + undeployed_pool
//
// Totals change only through deposit, user stake/unstake/withdraw,
// delegated stake/unstake/withdraw success, reward updates and drift
// adopted by the reconciler.
// ─────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;

use crate::{
    i128_str, u128_str, Balance, EpochHeight, Event, Fraction, OrchestratorConfig, StakingError,
    UserLedgerEntry, ValidatorInfo, ValidatorRecord,
};

/// Aggregate counters kept alongside the per-entry records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorTotals {
    /// Σ user staked_balance
    #[serde(with = "u128_str")]
    pub total_staked: Balance,
    /// Σ user unstaked_balance
    #[serde(with = "u128_str")]
    pub total_unstaked: Balance,
    /// Principal held by the orchestrator, not delegated to any validator
    #[serde(with = "u128_str")]
    pub undeployed_pool: Balance,
    /// Part of the undeployed pool committed to in-flight stake calls
    #[serde(with = "u128_str")]
    pub reserved_for_stake: Balance,
    /// Part of the delegated stake committed to in-flight unstake calls
    #[serde(with = "u128_str")]
    pub reserved_for_unstake: Balance,
    /// Net drift absorbed from adopted validator reports
    #[serde(with = "i128_str")]
    pub reconciled_drift: i128,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StakingLedger {
    pub owner_id: String,
    pub epoch_height: EpochHeight,
    pub num_epochs_to_unlock: EpochHeight,
    #[serde(with = "u128_str")]
    pub max_sync_balance_diff: Balance,
    pub reward_fee: Fraction,
    /// BTreeMap for deterministic iteration (state root, tie-breaking)
    pub accounts: BTreeMap<String, UserLedgerEntry>,
    pub validators: BTreeMap<String, ValidatorRecord>,
    pub totals: OrchestratorTotals,
    #[serde(skip)]
    logs: Vec<String>,
}

impl StakingLedger {
    /// Build a ledger from config. The owner's initial stake is credited as a
    /// staked balance backed by the undeployed pool.
    pub fn new(config: &OrchestratorConfig) -> Self {
        let mut ledger = Self {
            owner_id: config.owner_id.clone(),
            epoch_height: 0,
            num_epochs_to_unlock: config.num_epochs_to_unlock,
            max_sync_balance_diff: config.max_sync_balance_diff,
            reward_fee: config.reward_fee,
            accounts: BTreeMap::new(),
            validators: BTreeMap::new(),
            totals: OrchestratorTotals::default(),
            logs: Vec::new(),
        };

        if config.initial_stake > 0 {
            ledger.accounts.insert(
                config.owner_id.clone(),
                UserLedgerEntry {
                    staked_balance: config.initial_stake,
                    ..Default::default()
                },
            );
            ledger.totals.total_staked = config.initial_stake;
            ledger.totals.undeployed_pool = config.initial_stake;
        }

        for seed in &config.validators {
            ledger.validators.insert(
                seed.validator_id.clone(),
                ValidatorRecord::new(seed.validator_id.clone(), seed.weight),
            );
        }

        ledger
    }

    // ─────────────────────────────────────────────────────────────
    // EVENT LOG
    // ─────────────────────────────────────────────────────────────

    /// Record an event in the in-memory log and mirror it to the `log` facade.
    pub fn emit(&mut self, event: Event) {
        let line = event.to_log_line();
        if event.is_failure() {
            log::warn!("{}", line);
        } else {
            log::info!("{}", line);
        }
        self.logs.push(line);
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn drain_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    pub fn has_log(&self, needle: &str) -> bool {
        self.logs.iter().any(|l| l.contains(needle))
    }

    // ─────────────────────────────────────────────────────────────
    // ADMIN
    // ─────────────────────────────────────────────────────────────

    pub fn set_epoch_height(&mut self, epoch: EpochHeight) {
        self.epoch_height = epoch;
    }

    pub fn ensure_owner(&self, caller: &str) -> Result<(), StakingError> {
        if caller != self.owner_id {
            return Err(StakingError::NotOwner(caller.to_string()));
        }
        Ok(())
    }

    /// Register a validator with zero balances.
    pub fn add_validator(
        &mut self,
        caller: &str,
        validator_id: &str,
        weight: u32,
    ) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        if self.validators.contains_key(validator_id) {
            return Err(StakingError::ValidatorAlreadyExists(validator_id.to_string()));
        }
        self.validators.insert(
            validator_id.to_string(),
            ValidatorRecord::new(validator_id.to_string(), weight),
        );
        self.emit(Event::ValidatorAdded {
            validator_id: validator_id.to_string(),
            weight,
        });
        Ok(())
    }

    /// Remove a validator. Only allowed once it holds nothing and no call is in flight.
    pub fn remove_validator(&mut self, caller: &str, validator_id: &str) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        let validator = self.validator(validator_id)?;
        if validator.pending {
            return Err(StakingError::ValidatorPending(validator_id.to_string()));
        }
        if !validator.is_empty() {
            return Err(StakingError::ValidatorNotEmpty(validator_id.to_string()));
        }
        self.validators.remove(validator_id);
        self.emit(Event::ValidatorRemoved {
            validator_id: validator_id.to_string(),
        });
        Ok(())
    }

    pub fn update_weight(
        &mut self,
        caller: &str,
        validator_id: &str,
        weight: u32,
    ) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        let validator = self.validator_mut(validator_id)?;
        let old_weight = validator.weight;
        validator.weight = weight;
        self.emit(Event::ValidatorWeightUpdated {
            validator_id: validator_id.to_string(),
            old_weight,
            new_weight: weight,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // VALIDATOR QUERIES
    // ─────────────────────────────────────────────────────────────

    pub fn validator(&self, validator_id: &str) -> Result<&ValidatorRecord, StakingError> {
        self.validators
            .get(validator_id)
            .ok_or_else(|| StakingError::ValidatorNotFound(validator_id.to_string()))
    }

    pub fn validator_mut(&mut self, validator_id: &str) -> Result<&mut ValidatorRecord, StakingError> {
        self.validators
            .get_mut(validator_id)
            .ok_or_else(|| StakingError::ValidatorNotFound(validator_id.to_string()))
    }

    pub fn get_validator(&self, validator_id: &str) -> Option<ValidatorInfo> {
        self.validators.get(validator_id).map(ValidatorInfo::from)
    }

    pub fn get_validators(&self) -> Vec<ValidatorInfo> {
        self.validators.values().map(ValidatorInfo::from).collect()
    }

    pub fn total_weight(&self) -> u128 {
        self.validators.values().map(|v| v.weight as u128).sum()
    }

    /// Σ validator staked_amount
    pub fn delegated_staked(&self) -> Balance {
        self.validators.values().map(|v| v.staked_amount).sum()
    }

    /// Σ validator unstaked_amount
    pub fn delegated_unstaked(&self) -> Balance {
        self.validators.values().map(|v| v.unstaked_amount).sum()
    }

    /// Stake users want delegated that isn't delegated or in flight yet.
    pub fn stake_demand(&self) -> Balance {
        self.totals
            .total_staked
            .saturating_sub(self.delegated_staked().saturating_add(self.totals.reserved_for_stake))
    }

    /// Delegated stake in excess of what users still have staked, minus
    /// unstake calls already in flight.
    pub fn unstake_demand(&self) -> Balance {
        self.delegated_staked()
            .saturating_sub(self.totals.reserved_for_unstake)
            .saturating_sub(self.totals.total_staked)
    }

    /// Undeployed funds not committed to an in-flight stake call.
    pub fn available_undeployed(&self) -> Balance {
        self.totals
            .undeployed_pool
            .saturating_sub(self.totals.reserved_for_stake)
    }

    /// True when no validator has a call in flight.
    pub fn is_quiescent(&self) -> bool {
        self.validators.values().all(|v| !v.pending)
    }

    // ─────────────────────────────────────────────────────────────
    // USER LEDGER
    // ─────────────────────────────────────────────────────────────

    pub fn deposit(&mut self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let total_unstaked = self
            .totals
            .total_unstaked
            .checked_add(amount)
            .ok_or(StakingError::BalanceOverflow)?;
        let undeployed_pool = self
            .totals
            .undeployed_pool
            .checked_add(amount)
            .ok_or(StakingError::BalanceOverflow)?;

        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .deposit(amount)?;
        self.totals.total_unstaked = total_unstaked;
        self.totals.undeployed_pool = undeployed_pool;

        self.emit(Event::Deposit {
            account_id: account_id.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn deposit_and_stake(&mut self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        self.deposit(account_id, amount)?;
        self.stake(account_id, amount)
    }

    pub fn stake(&mut self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        self.account_mut(account_id)?.stake(amount)?;
        self.totals.total_unstaked -= amount;
        self.totals.total_staked += amount;

        self.emit(Event::Stake {
            account_id: account_id.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn stake_all(&mut self, account_id: &str) -> Result<Balance, StakingError> {
        let amount = self.account(account_id)?.unstaked_balance;
        self.stake(account_id, amount)?;
        Ok(amount)
    }

    /// Move `amount` from staked to unstaked. Restarts the account's unlock
    /// clock for its whole unstaked balance.
    pub fn unstake(&mut self, account_id: &str, amount: Balance) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let epoch = self.epoch_height;
        let unlock = self.num_epochs_to_unlock;
        let entry = self.account_mut(account_id)?;
        entry.unstake(amount, epoch)?;
        let available_epoch = entry.unstaked_available_epoch(unlock);
        self.totals.total_staked -= amount;
        self.totals.total_unstaked += amount;

        self.emit(Event::Unstake {
            account_id: account_id.to_string(),
            amount,
            available_epoch,
        });
        Ok(())
    }

    pub fn unstake_all(&mut self, account_id: &str) -> Result<Balance, StakingError> {
        let amount = self.account(account_id)?.staked_balance;
        self.unstake(account_id, amount)?;
        Ok(amount)
    }

    /// Pay `amount` of matured unstaked balance out of the undeployed pool.
    /// Returns the amount paid.
    pub fn withdraw(&mut self, account_id: &str, amount: Balance) -> Result<Balance, StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let epoch = self.epoch_height;
        let unlock = self.num_epochs_to_unlock;
        self.account(account_id)?
            .check_withdraw(amount, epoch, unlock)?;

        let available = self.available_undeployed();
        if available < amount {
            return Err(StakingError::InsufficientUndeployedFunds {
                requested: amount,
                available,
            });
        }

        self.account_mut(account_id)?.unstaked_balance -= amount;
        self.totals.total_unstaked -= amount;
        self.totals.undeployed_pool -= amount;

        self.emit(Event::Withdraw {
            account_id: account_id.to_string(),
            amount,
        });
        Ok(amount)
    }

    pub fn withdraw_all(&mut self, account_id: &str) -> Result<Balance, StakingError> {
        let amount = self.account(account_id)?.unstaked_balance;
        self.withdraw(account_id, amount)
    }

    fn account(&self, account_id: &str) -> Result<&UserLedgerEntry, StakingError> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| StakingError::AccountNotFound(account_id.to_string()))
    }

    fn account_mut(&mut self, account_id: &str) -> Result<&mut UserLedgerEntry, StakingError> {
        self.accounts
            .get_mut(account_id)
            .ok_or_else(|| StakingError::AccountNotFound(account_id.to_string()))
    }

    // ─────────────────────────────────────────────────────────────
    // USER VIEWS (unknown accounts read as zero)
    // ─────────────────────────────────────────────────────────────

    pub fn get_account(&self, account_id: &str) -> Option<UserLedgerEntry> {
        self.accounts.get(account_id).cloned()
    }

    pub fn get_account_staked_balance(&self, account_id: &str) -> Balance {
        self.accounts
            .get(account_id)
            .map(|a| a.staked_balance)
            .unwrap_or(0)
    }

    pub fn get_account_unstaked_balance(&self, account_id: &str) -> Balance {
        self.accounts
            .get(account_id)
            .map(|a| a.unstaked_balance)
            .unwrap_or(0)
    }

    pub fn get_account_total_balance(&self, account_id: &str) -> Balance {
        self.accounts
            .get(account_id)
            .map(|a| a.total_balance())
            .unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────
    // REWARDS
    // ─────────────────────────────────────────────────────────────

    /// Credit validator rewards to stakers. The owner takes `reward_fee`;
    /// the rest is split pro-rata by staked balance and rounding dust goes
    /// to the owner. Returns the owner's fee.
    pub fn distribute_rewards(&mut self, rewards: Balance) -> Balance {
        if rewards == 0 {
            return 0;
        }
        let fee = self.reward_fee.multiply(rewards);
        let mut remaining = rewards - fee;
        let total_staked = self.totals.total_staked;

        if total_staked > 0 {
            for entry in self.accounts.values_mut() {
                if entry.staked_balance == 0 {
                    continue;
                }
                let share = proportional(rewards - fee, entry.staked_balance, total_staked).min(remaining);
                entry.staked_balance += share;
                remaining -= share;
            }
        }

        let owner = self.accounts.entry(self.owner_id.clone()).or_default();
        owner.staked_balance += fee + remaining;
        self.totals.total_staked += rewards;
        fee
    }

    // ─────────────────────────────────────────────────────────────
    // AUDIT
    // ─────────────────────────────────────────────────────────────

    /// (Σ user balances + drift) − (Σ validator balances + undeployed pool).
    /// Zero whenever no call is in flight.
    pub fn conservation_gap(&self) -> i128 {
        let users: Balance = self.accounts.values().map(|a| a.total_balance()).sum();
        let validators: Balance = self.validators.values().map(|v| v.total_balance()).sum();
        (users as i128 + self.totals.reconciled_drift)
            - (validators as i128 + self.totals.undeployed_pool as i128)
    }

    /// Aggregate counters agree with the per-account records.
    pub fn totals_match_accounts(&self) -> bool {
        let staked: Balance = self.accounts.values().map(|a| a.staked_balance).sum();
        let unstaked: Balance = self.accounts.values().map(|a| a.unstaked_balance).sum();
        staked == self.totals.total_staked && unstaked == self.totals.total_unstaked
    }

    /// Deterministic SHA3-256 fingerprint over accounts, validators and totals.
    /// Two ledgers with equal roots hold the same balances and flags.
    pub fn compute_state_root(&self) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(self.epoch_height.to_le_bytes());
        // BTreeMap iterates in sorted key order
        for (id, a) in &self.accounts {
            hasher.update(id.as_bytes());
            hasher.update(a.staked_balance.to_le_bytes());
            hasher.update(a.unstaked_balance.to_le_bytes());
            hasher.update(a.unstake_start_epoch.unwrap_or(u64::MAX).to_le_bytes());
        }
        for (id, v) in &self.validators {
            hasher.update(id.as_bytes());
            hasher.update(v.weight.to_le_bytes());
            hasher.update(v.staked_amount.to_le_bytes());
            hasher.update(v.unstaked_amount.to_le_bytes());
            hasher.update(v.unstake_start_epoch.to_le_bytes());
            hasher.update([v.pending as u8]);
        }
        let t = &self.totals;
        hasher.update(t.total_staked.to_le_bytes());
        hasher.update(t.total_unstaked.to_le_bytes());
        hasher.update(t.undeployed_pool.to_le_bytes());
        hasher.update(t.reserved_for_stake.to_le_bytes());
        hasher.update(t.reserved_for_unstake.to_le_bytes());
        hasher.update(t.reconciled_drift.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// amount × part / whole, rounded down. On overflow, part and whole are
/// shifted right together until the product fits.
fn proportional(amount: Balance, part: Balance, whole: Balance) -> Balance {
    let (mut part, mut whole) = (part, whole);
    loop {
        if whole == 0 {
            return 0;
        }
        if let Some(product) = amount.checked_mul(part) {
            return product / whole;
        }
        part >>= 1;
        whole >>= 1;
    }
}
