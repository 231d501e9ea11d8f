use serde::{Deserialize, Serialize};

use crate::{u128_str, Balance, EpochHeight, StakingError};

/// Per-user staking account. Created on first deposit, never removed;
/// a fully withdrawn account stays behind with zero balances.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLedgerEntry {
    #[serde(with = "u128_str")]
    pub staked_balance: Balance,
    #[serde(with = "u128_str")]
    pub unstaked_balance: Balance,
    /// Epoch of the most recent unstake. `None` until the account first
    /// unstakes; deposited-but-never-staked funds are withdrawable at once.
    pub unstake_start_epoch: Option<EpochHeight>,
}

impl UserLedgerEntry {
    pub fn total_balance(&self) -> Balance {
        self.staked_balance.saturating_add(self.unstaked_balance)
    }

    /// First epoch at which the unstaked balance can be withdrawn.
    pub fn unstaked_available_epoch(&self, num_epochs_to_unlock: EpochHeight) -> EpochHeight {
        self.unstake_start_epoch
            .map(|start| start.saturating_add(num_epochs_to_unlock))
            .unwrap_or(0)
    }

    pub fn is_unstaked_available(&self, epoch: EpochHeight, num_epochs_to_unlock: EpochHeight) -> bool {
        epoch >= self.unstaked_available_epoch(num_epochs_to_unlock)
    }

    pub(crate) fn deposit(&mut self, amount: Balance) -> Result<(), StakingError> {
        self.unstaked_balance = self
            .unstaked_balance
            .checked_add(amount)
            .ok_or(StakingError::BalanceOverflow)?;
        Ok(())
    }

    pub(crate) fn stake(&mut self, amount: Balance) -> Result<(), StakingError> {
        if self.unstaked_balance < amount {
            return Err(StakingError::InsufficientUnstakedBalance {
                requested: amount,
                available: self.unstaked_balance,
            });
        }
        self.unstaked_balance -= amount;
        self.staked_balance += amount;
        Ok(())
    }

    /// Moves `amount` to the unstaked balance and restarts the unlock clock
    /// for the whole unstaked balance.
    pub(crate) fn unstake(&mut self, amount: Balance, epoch: EpochHeight) -> Result<(), StakingError> {
        if self.staked_balance < amount {
            return Err(StakingError::InsufficientStakedBalance {
                requested: amount,
                available: self.staked_balance,
            });
        }
        self.staked_balance -= amount;
        self.unstaked_balance += amount;
        self.unstake_start_epoch = Some(epoch);
        Ok(())
    }

    pub(crate) fn check_withdraw(
        &self,
        amount: Balance,
        epoch: EpochHeight,
        num_epochs_to_unlock: EpochHeight,
    ) -> Result<(), StakingError> {
        if self.unstaked_balance < amount {
            return Err(StakingError::InsufficientUnstakedBalance {
                requested: amount,
                available: self.unstaked_balance,
            });
        }
        if !self.is_unstaked_available(epoch, num_epochs_to_unlock) {
            return Err(StakingError::UnstakedBalanceNotYetAvailable {
                available_epoch: self.unstaked_available_epoch(num_epochs_to_unlock),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NUM_EPOCHS_TO_UNLOCK;

    #[test]
    fn test_fresh_account_withdrawable() {
        let mut entry = UserLedgerEntry::default();
        entry.deposit(10).unwrap();
        assert!(entry.check_withdraw(5, 0, NUM_EPOCHS_TO_UNLOCK).is_ok());
    }

    #[test]
    fn test_unstake_starts_clock() {
        let mut entry = UserLedgerEntry::default();
        entry.deposit(10).unwrap();
        entry.stake(9).unwrap();
        entry.unstake(5, 3).unwrap();
        assert_eq!(entry.staked_balance, 4);
        assert_eq!(entry.unstaked_balance, 6);
        assert_eq!(entry.unstaked_available_epoch(NUM_EPOCHS_TO_UNLOCK), 7);

        assert_eq!(
            entry.check_withdraw(6, 6, NUM_EPOCHS_TO_UNLOCK),
            Err(StakingError::UnstakedBalanceNotYetAvailable { available_epoch: 7 })
        );
        assert!(entry.check_withdraw(6, 7, NUM_EPOCHS_TO_UNLOCK).is_ok());
    }

    #[test]
    fn test_unstake_more_than_staked() {
        let mut entry = UserLedgerEntry::default();
        entry.deposit(10).unwrap();
        entry.stake(3).unwrap();
        let err = entry.unstake(4, 0).unwrap_err();
        assert_eq!(
            err,
            StakingError::InsufficientStakedBalance {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(entry.staked_balance, 3);
        assert_eq!(entry.unstake_start_epoch, None);
    }

    #[test]
    fn test_stake_more_than_unstaked() {
        let mut entry = UserLedgerEntry::default();
        entry.deposit(10).unwrap();
        assert!(entry.stake(11).is_err());
        assert_eq!(entry.unstaked_balance, 10);
    }
}
