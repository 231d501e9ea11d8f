use crate::{Balance, EpochHeight};

/// Precondition violations surfaced synchronously to the caller.
/// None of these leave a state change behind or reach a validator pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    #[error("The amount should be a positive number")]
    ZeroAmount,

    #[error("Account {0} is not registered")]
    AccountNotFound(String),

    #[error("Not enough staked balance to unstake: requested {requested}, staked {available}")]
    InsufficientStakedBalance { requested: Balance, available: Balance },

    #[error("Not enough unstaked balance: requested {requested}, unstaked {available}")]
    InsufficientUnstakedBalance { requested: Balance, available: Balance },

    #[error(
        "The unstaked balance is not yet available due to unstaking delay (available at epoch {available_epoch})"
    )]
    UnstakedBalanceNotYetAvailable { available_epoch: EpochHeight },

    #[error("Undeployed pool cannot cover the withdrawal: requested {requested}, available {available}")]
    InsufficientUndeployedFunds { requested: Balance, available: Balance },

    #[error("Only the owner can call this method (caller {0})")]
    NotOwner(String),

    #[error("Validator {0} already exists")]
    ValidatorAlreadyExists(String),

    #[error("Validator {0} not found")]
    ValidatorNotFound(String),

    #[error("Validator {0} still holds staked or unstaked funds")]
    ValidatorNotEmpty(String),

    #[error("Validator {0} has a call in flight")]
    ValidatorPending(String),

    #[error(
        "Unstaked funds at validator {validator_id} are not withdrawable before epoch {available_epoch}"
    )]
    ValidatorUnstakeNotMatured {
        validator_id: String,
        available_epoch: EpochHeight,
    },

    #[error("Balance overflow")]
    BalanceOverflow,
}
