// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BENCHMARK SUITE — lstake-orchestrator
//
// Measures validator selection, reconciliation and a full epoch cycle
// against the in-process mock pool.
// Run: cargo bench -p lstake-orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lstake_core::{tokens, OrchestratorConfig, StakingLedger};
use lstake_orchestrator::reconciler::sync_validator_balance;
use lstake_orchestrator::stake_scheduler::select_stake_candidate;
use lstake_orchestrator::unstake_scheduler::select_unstake_candidate;
use lstake_orchestrator::{MockStakingPool, Orchestrator, PoolAccount};
use std::sync::Arc;

fn ledger_with_validators(count: usize) -> StakingLedger {
    let mut ledger = StakingLedger::new(&OrchestratorConfig::new("owner"));
    for i in 0..count {
        let id = format!("validator-{:04}", i);
        ledger.add_validator("owner", &id, 10 + (i % 7) as u32).unwrap();
        ledger.validator_mut(&id).unwrap().staked_amount = tokens(1 + (i % 13) as u128);
    }
    ledger.deposit_and_stake("alice", tokens(count as u128 * 10)).unwrap();
    ledger.drain_logs();
    ledger
}

// ─────────────────────────────────────────────────────────────────
// SELECTION BENCHMARKS
// ─────────────────────────────────────────────────────────────────

fn bench_select_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/select");
    for count in [10usize, 100, 1_000] {
        let ledger = ledger_with_validators(count);
        group.bench_with_input(BenchmarkId::new("stake", count), &ledger, |b, l| {
            b.iter(|| black_box(select_stake_candidate(l)))
        });
        group.bench_with_input(BenchmarkId::new("unstake", count), &ledger, |b, l| {
            b.iter(|| black_box(select_unstake_candidate(l)))
        });
    }
    group.finish();
}

// ─────────────────────────────────────────────────────────────────
// RECONCILER BENCHMARKS
// ─────────────────────────────────────────────────────────────────

fn bench_sync_validator_balance(c: &mut Criterion) {
    let ledger = ledger_with_validators(100);
    let report = PoolAccount {
        staked_balance: tokens(1) + 50,
        unstaked_balance: 0,
    };
    c.bench_function("reconciler/sync_within_tolerance", |b| {
        b.iter_batched(
            || ledger.clone(),
            |mut l| black_box(sync_validator_balance(&mut l, "validator-0000", Ok(report))),
            criterion::BatchSize::SmallInput,
        )
    });
}

// ─────────────────────────────────────────────────────────────────
// FULL EPOCH CYCLE
// ─────────────────────────────────────────────────────────────────

fn bench_epoch_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    c.bench_function("orchestrator/stake_unstake_cycle", |b| {
        b.to_async(&rt).iter(|| async {
            let pool = Arc::new(MockStakingPool::new());
            let o = Orchestrator::new(&OrchestratorConfig::new("owner"), pool);
            o.add_validator("owner", "v1", 10).unwrap();
            o.add_validator("owner", "v2", 20).unwrap();
            o.deposit_and_stake("alice", tokens(50)).unwrap();
            o.epoch_stake().await;
            o.epoch_stake().await;
            o.set_epoch_height(1);
            o.unstake("alice", tokens(10)).unwrap();
            black_box(o.epoch_unstake().await)
        })
    });
}

criterion_group!(
    benches,
    bench_select_candidates,
    bench_sync_validator_balance,
    bench_epoch_cycle,
);
criterion_main!(benches);
