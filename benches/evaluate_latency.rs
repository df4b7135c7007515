//! # Evaluation-Path Latency Benchmarks
//!
//! The engine runs once per queue per tick on the control loop's hot path;
//! these benchmarks keep its cost visible. The capacity probe is pinned so
//! the numbers measure decision math, not sysinfo.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use queuescale::calculator::{drain_target, steady_state, CapacityCalculator, SystemProbe};
use queuescale::config::{LimitsConfig, PredictionConfig, QueueConfig};
use queuescale::engine::ScalingEngine;
use queuescale::metrics::QueueSnapshot;
use queuescale::strategy::ScalingStrategy;
use queuescale::types::QueueKey;

fn snapshot() -> QueueSnapshot {
    let mut snap = QueueSnapshot::cold(&QueueKey::new("redis", "default"));
    snap.pending = 250;
    snap.oldest_age_seconds = 24;
    snap.throughput_per_minute = 600.0;
    snap.avg_duration_seconds = 2.0;
    snap.active_workers = 20;
    snap
}

fn queue_config() -> QueueConfig {
    QueueConfig {
        slo_pickup_seconds: 30,
        min_workers: 1,
        max_workers: 100,
        cooldown_seconds: 60,
        breach_threshold: 0.8,
        cooldown_blocks_same_direction: false,
    }
}

fn engine() -> ScalingEngine {
    let strategy =
        ScalingStrategy::from_name("hybrid_predictive", &PredictionConfig::default()).unwrap();
    let probe = SystemProbe {
        total_cores: 33,
        cpu_usage_percent: 20.0,
        total_memory_mb: 65_536,
        used_memory_mb: 16_384,
    };
    let capacity = CapacityCalculator::with_fixed_probe(LimitsConfig::default(), probe);
    ScalingEngine::new(strategy, capacity)
}

fn bench_engine_evaluate(c: &mut Criterion) {
    let snap = snapshot();
    let config = queue_config();
    let mut engine = engine();

    c.bench_function("engine_evaluate", |b| {
        b.iter(|| {
            let decision = engine.evaluate(black_box(&snap), black_box(&config), black_box(20));
            black_box(decision)
        });
    });
}

fn bench_drain_calculator(c: &mut Criterion) {
    c.bench_function("drain_target", |b| {
        b.iter(|| {
            black_box(drain_target(
                black_box(250),
                black_box(24),
                black_box(30),
                black_box(2.0),
                black_box(0.8),
            ))
        });
    });
}

fn bench_steady_state(c: &mut Criterion) {
    c.bench_function("steady_state", |b| {
        b.iter(|| black_box(steady_state(black_box(10.0), black_box(2.0))));
    });
}

criterion_group!(
    benches,
    bench_engine_evaluate,
    bench_drain_calculator,
    bench_steady_state
);
criterion_main!(benches);
