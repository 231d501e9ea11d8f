// ─────────────────────────────────────────────────────────────────
// Validator Pool Client — the four operations a validator pool exposes
// ─────────────────────────────────────────────────────────────────
// Every call is async and independently fallible. The orchestrator never
// assumes an effect it has not seen succeed: a call that does not answer
// within the deadline resolves to PoolError::Timeout and is handled like
// any other failure.
// ─────────────────────────────────────────────────────────────────

use async_trait::async_trait;
use lstake_core::{u128_str, Balance};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("validator {validator_id} rejected the call: {reason}")]
    Rejected { validator_id: String, reason: String },

    #[error("validator {0} is unreachable")]
    Unreachable(String),

    #[error("call to validator {validator_id} timed out after {timeout_ms} ms")]
    Timeout { validator_id: String, timeout_ms: u64 },
}

/// Balances a validator pool reports for the orchestrator's account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAccount {
    #[serde(with = "u128_str")]
    pub staked_balance: Balance,
    #[serde(with = "u128_str")]
    pub unstaked_balance: Balance,
}

#[async_trait]
pub trait ValidatorPoolClient: Send + Sync {
    /// Deposit `amount` at the pool and stake it. Err ⇒ nothing moved.
    async fn delegate_stake(&self, validator_id: &str, amount: Balance) -> Result<(), PoolError>;

    /// Start unstaking `amount`. Err ⇒ nothing moved.
    async fn delegate_unstake(&self, validator_id: &str, amount: Balance)
        -> Result<(), PoolError>;

    /// Pull matured unstaked principal back into orchestrator custody.
    async fn delegate_withdraw(&self, validator_id: &str, amount: Balance)
        -> Result<(), PoolError>;

    /// Read-only. Err never means "balances are zero".
    async fn query_account(&self, validator_id: &str) -> Result<PoolAccount, PoolError>;
}

/// Run a pool call under a deadline; an expired deadline is a failure.
pub async fn call_with_timeout<T, F>(
    validator_id: &str,
    timeout: Duration,
    call: F,
) -> Result<T, PoolError>
where
    F: Future<Output = Result<T, PoolError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(PoolError::Timeout {
            validator_id: validator_id.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_within_deadline() {
        let result = call_with_timeout("v1", Duration::from_millis(50), async {
            Ok::<_, PoolError>(7u8)
        })
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_call_past_deadline_is_failure() {
        let result: Result<(), PoolError> =
            call_with_timeout("v1", Duration::from_millis(10), std::future::pending()).await;
        assert_eq!(
            result,
            Err(PoolError::Timeout {
                validator_id: "v1".to_string(),
                timeout_ms: 10
            })
        );
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<(), PoolError> = call_with_timeout("v1", Duration::from_millis(50), async {
            Err(PoolError::Unreachable("v1".to_string()))
        })
        .await;
        assert_eq!(result, Err(PoolError::Unreachable("v1".to_string())));
    }
}
