// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// INTEGRATION TESTS — epoch action failures
//
// Drives the orchestrator against the mock staking pool with injected
// faults and checks the ledger, the reported outcome and the event log.
// Run: cargo test --test epoch_action_failure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use lstake_core::{tokens, Balance, OrchestratorConfig, StakingError, MAX_SYNC_BALANCE_DIFF};
use lstake_orchestrator::{EpochOutcome, MockStakingPool, Orchestrator, PoolCall};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Orchestrator, Arc<MockStakingPool>) {
    let pool = Arc::new(MockStakingPool::new());
    let mut config = OrchestratorConfig::new("owner");
    config.call_timeout_ms = 100;
    let orchestrator = Orchestrator::new(&config, pool.clone());
    orchestrator.add_validator("owner", "v1", 10).unwrap();
    // owner's initial 10 + alice's 50
    orchestrator.deposit_and_stake("alice", tokens(50)).unwrap();
    (orchestrator, pool)
}

/// Stake everything to v1, then unstake 10 at epoch 11.
async fn setup_unstaked() -> (Orchestrator, Arc<MockStakingPool>) {
    let (o, pool) = setup();
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(60), 0);
    o.set_epoch_height(11);
    o.unstake("alice", tokens(10)).unwrap();
    (o, pool)
}

fn assert_validator(o: &Orchestrator, id: &str, staked: Balance, unstaked: Balance) {
    let v = o.get_validator(id).unwrap();
    assert_eq!(v.staked_amount, staked, "{} staked", id);
    assert_eq!(v.unstaked_amount, unstaked, "{} unstaked", id);
    assert!(!v.pending, "{} left pending", id);
}

// ─────────────────────────────────────────────────────────────────
// EPOCH STAKE
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_epoch_stake_fails_when_pool_panics() {
    let (o, pool) = setup();
    pool.set_panic("v1", true);

    let outcome = o.epoch_stake().await;
    assert_eq!(outcome, EpochOutcome::Failed);
    assert!(o.has_log("epoch_stake_failed"));
    assert_validator(&o, "v1", 0, 0);
    assert_eq!(o.get_summary().undeployed_pool, tokens(60));
    assert_eq!(o.conservation_gap(), 0);
}

#[tokio::test]
async fn test_epoch_stake_trusted_when_read_back_fails() {
    let (o, pool) = setup();
    pool.set_get_account_fail("v1", true);

    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert!(o.has_log("sync_validator_balance_failed_cant_get_account"));
    assert_validator(&o, "v1", tokens(60), 0);
}

#[tokio::test]
async fn test_epoch_stake_ignores_large_diff() {
    let (o, pool) = setup();
    let diff = MAX_SYNC_BALANCE_DIFF + 1;
    pool.set_balance_delta("v1", diff, diff);

    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert!(o.has_log("sync_validator_balance_failed_large_diff"));
    assert_validator(&o, "v1", tokens(60), 0);
    assert_eq!(o.get_summary().reconciled_drift, 0);
}

#[tokio::test]
async fn test_epoch_stake_adopts_diff_at_tolerance() {
    let (o, pool) = setup();
    pool.set_balance_delta("v1", MAX_SYNC_BALANCE_DIFF, MAX_SYNC_BALANCE_DIFF);

    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert!(o.has_log("sync_validator_balance_success"));
    assert!(!o.has_log("sync_validator_balance_failed"));
    assert_validator(
        &o,
        "v1",
        tokens(60) + MAX_SYNC_BALANCE_DIFF,
        MAX_SYNC_BALANCE_DIFF,
    );
    assert_eq!(
        o.get_summary().reconciled_drift,
        2 * MAX_SYNC_BALANCE_DIFF as i128
    );
    assert_eq!(o.conservation_gap(), 0);
}

#[tokio::test]
async fn test_epoch_stake_times_out_on_hanging_pool() {
    let (o, pool) = setup();
    pool.set_hang("v1", true);

    assert_eq!(o.epoch_stake().await, EpochOutcome::Failed);
    assert!(o.has_log("epoch_stake_failed"));
    assert_validator(&o, "v1", 0, 0);

    // recovers on the next epoch once the pool answers
    pool.set_hang("v1", false);
    o.set_epoch_height(1);
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(60), 0);
}

#[tokio::test]
async fn test_cancelled_epoch_stake_releases_validator() {
    let (o, pool) = setup();
    pool.set_delay("v1", Some(Duration::from_millis(200)));

    let cancelled = tokio::time::timeout(Duration::from_millis(20), o.epoch_stake()).await;
    assert!(cancelled.is_err());
    assert!(o.has_log("epoch_stake_failed"));
    assert_validator(&o, "v1", 0, 0);
    assert_eq!(o.ledger().lock().unwrap().totals.reserved_for_stake, 0);
    assert!(o.is_quiescent());
    assert_eq!(o.conservation_gap(), 0);

    pool.set_delay("v1", None);
    o.set_epoch_height(1);
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(60), 0);
}

// ─────────────────────────────────────────────────────────────────
// EPOCH UNSTAKE
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_epoch_unstake_fails_when_pool_panics() {
    let (o, pool) = setup_unstaked().await;
    pool.set_panic("v1", true);

    assert_eq!(o.epoch_unstake().await, EpochOutcome::Failed);
    assert!(o.has_log("epoch_unstake_failed"));
    assert_validator(&o, "v1", tokens(60), 0);
    assert_eq!(o.conservation_gap(), 0);
}

#[tokio::test]
async fn test_epoch_unstake_trusted_when_read_back_fails() {
    let (o, pool) = setup_unstaked().await;
    pool.set_get_account_fail("v1", true);

    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    assert!(o.has_log("sync_validator_balance_failed_cant_get_account"));
    assert_validator(&o, "v1", tokens(50), tokens(10));
}

#[tokio::test]
async fn test_epoch_unstake_ignores_large_diff() {
    let (o, pool) = setup_unstaked().await;
    let diff = MAX_SYNC_BALANCE_DIFF + 1;
    pool.set_balance_delta("v1", diff, diff);

    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    assert!(o.has_log("sync_validator_balance_failed_large_diff"));
    assert_validator(&o, "v1", tokens(50), tokens(10));
}

#[tokio::test]
async fn test_cancelled_epoch_unstake_returns_demand() {
    let (o, pool) = setup_unstaked().await;
    pool.set_delay("v1", Some(Duration::from_millis(200)));

    let cancelled = tokio::time::timeout(Duration::from_millis(20), o.epoch_unstake()).await;
    assert!(cancelled.is_err());
    assert!(o.has_log("epoch_unstake_failed"));
    assert_validator(&o, "v1", tokens(60), 0);
    assert_eq!(o.ledger().lock().unwrap().totals.reserved_for_unstake, 0);

    pool.set_delay("v1", None);
    o.set_epoch_height(12);
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(50), tokens(10));
}

#[tokio::test]
async fn test_failed_unstake_retried_next_epoch() {
    let (o, pool) = setup_unstaked().await;
    pool.set_panic("v1", true);
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Failed);

    pool.set_panic("v1", false);
    // throttled for the rest of the epoch
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Idle);

    o.set_epoch_height(12);
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(50), tokens(10));
    assert_eq!(o.get_validator("v1").unwrap().unstake_start_epoch, 12);
}

// ─────────────────────────────────────────────────────────────────
// WITHDRAW AND REWARDS
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_epoch_withdraw_fails_when_pool_panics() {
    let (o, pool) = setup();
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    o.set_epoch_height(14);
    o.unstake("alice", tokens(10)).unwrap();
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(50), tokens(10));

    o.set_epoch_height(18);
    pool.set_panic("v1", true);
    assert_eq!(o.epoch_withdraw("v1").await, Ok(EpochOutcome::Failed));
    assert!(o.has_log("epoch_withdraw_failed"));
    assert_validator(&o, "v1", tokens(50), tokens(10));

    pool.set_panic("v1", false);
    assert_eq!(o.epoch_withdraw("v1").await, Ok(EpochOutcome::Completed));
    assert_validator(&o, "v1", tokens(50), 0);
    assert_eq!(o.get_summary().undeployed_pool, tokens(10));
    assert_eq!(o.conservation_gap(), 0);
}

#[tokio::test]
async fn test_epoch_withdraw_before_maturity_never_calls_pool() {
    let (o, pool) = setup_unstaked().await;
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    let calls_before = pool.calls("v1").len();

    o.set_epoch_height(14);
    assert_eq!(
        o.epoch_withdraw("v1").await,
        Err(StakingError::ValidatorUnstakeNotMatured {
            validator_id: "v1".to_string(),
            available_epoch: 15
        })
    );
    assert_eq!(pool.calls("v1").len(), calls_before);
    assert!(!pool.calls("v1").contains(&PoolCall::Withdraw));
}

#[tokio::test]
async fn test_update_rewards_failure_keeps_balance() {
    let (o, pool) = setup();
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(60), 0);

    pool.add_reward("v1", tokens(1));
    pool.set_panic("v1", true);

    assert_eq!(o.epoch_update_rewards("v1").await, Ok(EpochOutcome::Failed));
    assert!(o.has_log("epoch_update_rewards_failed"));
    assert_validator(&o, "v1", tokens(60), 0);
    assert_eq!(o.get_account_staked_balance("alice"), tokens(50));
}

#[tokio::test]
async fn test_update_rewards_credits_stakers() {
    let (o, pool) = setup();
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    pool.add_reward("v1", tokens(6));

    assert_eq!(o.epoch_update_rewards("v1").await, Ok(EpochOutcome::Completed));
    assert_validator(&o, "v1", tokens(66), 0);

    let fee = tokens(6) / 100;
    let rest = tokens(6) - fee;
    assert_eq!(
        o.get_account_staked_balance("alice"),
        tokens(50) + rest * 50 / 60
    );
    assert_eq!(o.get_summary().total_staked, tokens(66));
    assert_eq!(o.conservation_gap(), 0);

    // once per epoch
    assert_eq!(o.epoch_update_rewards("v1").await, Ok(EpochOutcome::Idle));
}

// ─────────────────────────────────────────────────────────────────
// ISOLATION
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_isolated_to_one_validator() {
    let (o, pool) = setup();
    o.add_validator("owner", "v2", 10).unwrap();
    pool.set_panic("v1", true);

    // targets 30 each; v1 (first by id) is tried first and fails
    assert_eq!(o.epoch_stake().await, EpochOutcome::Failed);
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_eq!(o.epoch_stake().await, EpochOutcome::Idle);

    assert_validator(&o, "v1", 0, 0);
    assert_validator(&o, "v2", tokens(30), 0);
    assert_eq!(o.get_summary().undeployed_pool, tokens(30));
    assert_eq!(o.conservation_gap(), 0);

    // v1 catches up next epoch
    pool.set_panic("v1", false);
    o.set_epoch_height(1);
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_validator(&o, "v1", tokens(30), 0);
}

#[tokio::test]
async fn test_concurrent_triggers_never_double_stake() {
    let (o, pool) = setup();
    pool.set_delay("v1", Some(std::time::Duration::from_millis(20)));

    let (a, b) = tokio::join!(o.epoch_stake(), o.epoch_stake());
    let outcomes = [a, b];
    assert_eq!(
        outcomes.iter().filter(|r| r.is_success()).count(),
        1,
        "{:?}",
        outcomes
    );
    assert!(outcomes.contains(&EpochOutcome::Idle));
    assert_validator(&o, "v1", tokens(60), 0);
    assert_eq!(pool.balances("v1"), (tokens(60), 0));
}

#[tokio::test]
async fn test_withdraw_all_runs_each_matured_validator() {
    let (o, pool) = setup();
    o.add_validator("owner", "v2", 10).unwrap();
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);
    assert_eq!(o.epoch_stake().await, EpochOutcome::Completed);

    o.set_epoch_height(1);
    o.unstake("alice", tokens(40)).unwrap();
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    assert_eq!(o.epoch_unstake().await, EpochOutcome::Completed);
    pool.set_panic("v2", true);

    o.set_epoch_height(5);
    let results = o.epoch_withdraw_all().await;
    assert_eq!(
        results,
        vec![
            ("v1".to_string(), Ok(EpochOutcome::Completed)),
            ("v2".to_string(), Ok(EpochOutcome::Failed)),
        ]
    );
    assert_eq!(o.get_validator("v1").unwrap().unstaked_amount, 0);
    assert_eq!(o.get_validator("v2").unwrap().unstaked_amount, tokens(20));
    assert_eq!(o.conservation_gap(), 0);
}
