// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LSTAKE - CORE MODULE
//
// Ledger primitives for the liquid-staking orchestrator: validator records,
// per-user staking accounts, aggregate totals and the structured event log.
// All balance arithmetic uses u128 base units (no floating-point).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod account;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod validator;

pub use account::UserLedgerEntry;
pub use config::{Fraction, OrchestratorConfig, ValidatorSeed};
pub use error::StakingError;
pub use events::Event;
pub use ledger::{OrchestratorTotals, StakingLedger};
pub use validator::{ValidatorInfo, ValidatorRecord};

/// Epoch counter as reported by the host chain.
pub type EpochHeight = u64;

/// Token amounts in base units.
pub type Balance = u128;

/// 1 token = 10^24 base units
pub const YOCTO_PER_TOKEN: Balance = 1_000_000_000_000_000_000_000_000;

/// Number of epochs unstaked funds stay locked before they can be withdrawn,
/// both at the validator pools and in the user ledger.
pub const NUM_EPOCHS_TO_UNLOCK: EpochHeight = 4;

/// Largest difference (base units) between the expected and the reported
/// validator balance that the reconciler still accepts as organic drift.
pub const MAX_SYNC_BALANCE_DIFF: Balance = 100;

/// Stake the owner seeds the pool with at construction (10 tokens).
pub const DEFAULT_INITIAL_STAKE: Balance = 10 * YOCTO_PER_TOKEN;

/// Time allowed for a single validator pool call before it counts as failed.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// Convert whole tokens to base units.
pub const fn tokens(amount: u128) -> Balance {
    amount * YOCTO_PER_TOKEN
}

/// Serde adapter for u128 ↔ string.
/// TOML and JSON consumers can't carry full u128 precision as numbers, so
/// balances are written as decimal strings and read back from either form.
pub mod u128_str {
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(val: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        struct U128Visitor;

        impl<'de> de::Visitor<'de> for U128Visitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a u128 as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                if v >= 0 {
                    Ok(v as u128)
                } else {
                    Err(E::custom("negative value for u128"))
                }
            }
        }

        d.deserialize_any(U128Visitor)
    }
}

/// Same as [`u128_str`] for the signed drift counter.
pub mod i128_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(val: &i128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i128, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}
