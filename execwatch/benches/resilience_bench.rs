//! Benchmarks for the resilience hot paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use execwatch::core::ExecutionStatus;
use execwatch::polling::PollStrategy;
use execwatch::resilience::{CircuitBreakerConfig, CircuitRegistry, RetryConfig};

fn backoff_benchmark(c: &mut Criterion) {
    let config = RetryConfig::new()
        .with_base_delay_ms(500)
        .with_max_delay_ms(30_000)
        .with_jitter_ratio(0.2);

    c.bench_function("backoff_delay", |b| {
        b.iter(|| {
            for attempt in 0..8 {
                black_box(config.backoff_delay(black_box(attempt)));
            }
        })
    });
}

fn circuit_benchmark(c: &mut Criterion) {
    let registry = CircuitRegistry::new(CircuitBreakerConfig::default());

    c.bench_function("circuit_closed_call", |b| {
        b.iter(|| {
            black_box(registry.begin_call(black_box("get-status")));
            registry.record_success("get-status");
        })
    });
}

fn strategy_benchmark(c: &mut Criterion) {
    let strategy = PollStrategy::hybrid();

    c.bench_function("next_interval", |b| {
        b.iter(|| {
            for identical in 0..10 {
                black_box(strategy.next_interval(
                    black_box(ExecutionStatus::Running),
                    black_box(identical),
                ));
            }
        })
    });
}

criterion_group!(benches, backoff_benchmark, circuit_benchmark, strategy_benchmark);
criterion_main!(benches);
