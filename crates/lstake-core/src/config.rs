use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{
    u128_str, Balance, EpochHeight, DEFAULT_CALL_TIMEOUT_MS, DEFAULT_INITIAL_STAKE,
    MAX_SYNC_BALANCE_DIFF, NUM_EPOCHS_TO_UNLOCK,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("owner_id cannot be empty")]
    EmptyOwner,
    #[error("reward fee {numerator}/{denominator} is not a fraction in [0, 1]")]
    InvalidRewardFee { numerator: u32, denominator: u32 },
    #[error("num_epochs_to_unlock must be at least 1")]
    ZeroUnlockDelay,
    #[error("call_timeout_ms must be positive")]
    ZeroCallTimeout,
    #[error("validator seed #{0} has an empty id")]
    EmptyValidatorId(usize),
    #[error("validator {0} is listed twice")]
    DuplicateValidator(String),
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("cannot parse {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// A ratio such as the owner's reward fee (1/100 = 1%).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.denominator != 0 && self.numerator <= self.denominator
    }

    /// value × numerator / denominator, rounded down, without intermediate overflow.
    pub fn multiply(&self, value: Balance) -> Balance {
        if self.denominator == 0 {
            return 0;
        }
        let num = self.numerator as u128;
        let den = self.denominator as u128;
        (value / den)
            .saturating_mul(num)
            .saturating_add((value % den) * num / den)
    }
}

impl std::str::FromStr for Fraction {
    type Err = String;

    /// Parses "1/100".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .split_once('/')
            .ok_or_else(|| format!("expected numerator/denominator, got {}", s))?;
        let numerator = num.trim().parse().map_err(|e| format!("{}", e))?;
        let denominator = den.trim().parse().map_err(|e| format!("{}", e))?;
        Ok(Self::new(numerator, denominator))
    }
}

/// Validator registered at construction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorSeed {
    pub validator_id: String,
    pub weight: u32,
}

/// Orchestrator settings, usually read from `lstake.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub owner_id: String,
    /// Stake the owner seeds the pool with
    #[serde(with = "u128_str", default = "default_initial_stake")]
    pub initial_stake: Balance,
    #[serde(with = "u128_str", default = "default_max_sync_balance_diff")]
    pub max_sync_balance_diff: Balance,
    #[serde(default = "default_num_epochs_to_unlock")]
    pub num_epochs_to_unlock: EpochHeight,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Owner's cut of validator rewards
    #[serde(default = "default_reward_fee")]
    pub reward_fee: Fraction,
    #[serde(default)]
    pub validators: Vec<ValidatorSeed>,
}

fn default_initial_stake() -> Balance {
    DEFAULT_INITIAL_STAKE
}

fn default_max_sync_balance_diff() -> Balance {
    MAX_SYNC_BALANCE_DIFF
}

fn default_num_epochs_to_unlock() -> EpochHeight {
    NUM_EPOCHS_TO_UNLOCK
}

fn default_reward_fee() -> Fraction {
    Fraction::new(1, 100)
}

fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

impl OrchestratorConfig {
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            initial_stake: default_initial_stake(),
            max_sync_balance_diff: default_max_sync_balance_diff(),
            num_epochs_to_unlock: default_num_epochs_to_unlock(),
            call_timeout_ms: default_call_timeout_ms(),
            reward_fee: default_reward_fee(),
            validators: Vec::new(),
        }
    }

    /// Load config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: OrchestratorConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `LSTAKE_*` environment variables
    /// Useful for containerized deployments
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::load_from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`load_from_env`](Self::load_from_env) with an explicit lookup.
    pub fn load_from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let owner_id = lookup("LSTAKE_OWNER_ID").ok_or(ConfigError::MissingVar("LSTAKE_OWNER_ID"))?;
        let mut config = Self::new(&owner_id);

        if let Some(v) = lookup("LSTAKE_INITIAL_STAKE") {
            config.initial_stake = parse_var("LSTAKE_INITIAL_STAKE", &v)?;
        }
        if let Some(v) = lookup("LSTAKE_MAX_SYNC_BALANCE_DIFF") {
            config.max_sync_balance_diff = parse_var("LSTAKE_MAX_SYNC_BALANCE_DIFF", &v)?;
        }
        if let Some(v) = lookup("LSTAKE_NUM_EPOCHS_TO_UNLOCK") {
            config.num_epochs_to_unlock = parse_var("LSTAKE_NUM_EPOCHS_TO_UNLOCK", &v)?;
        }
        if let Some(v) = lookup("LSTAKE_REWARD_FEE") {
            config.reward_fee = parse_var("LSTAKE_REWARD_FEE", &v)?;
        }
        if let Some(v) = lookup("LSTAKE_CALL_TIMEOUT_MS") {
            config.call_timeout_ms = parse_var("LSTAKE_CALL_TIMEOUT_MS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_id.is_empty() {
            return Err(ConfigError::EmptyOwner);
        }
        if !self.reward_fee.is_valid() {
            return Err(ConfigError::InvalidRewardFee {
                numerator: self.reward_fee.numerator,
                denominator: self.reward_fee.denominator,
            });
        }
        if self.num_epochs_to_unlock == 0 {
            return Err(ConfigError::ZeroUnlockDelay);
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::ZeroCallTimeout);
        }
        for (i, seed) in self.validators.iter().enumerate() {
            if seed.validator_id.is_empty() {
                return Err(ConfigError::EmptyValidatorId(i));
            }
            if self.validators[..i]
                .iter()
                .any(|s| s.validator_id == seed.validator_id)
            {
                return Err(ConfigError::DuplicateValidator(seed.validator_id.clone()));
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidVar {
        var,
        value: value.to_string(),
    })
}
