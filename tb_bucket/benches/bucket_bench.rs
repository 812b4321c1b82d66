use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use tb_bucket::FixedIntervalRefillStrategy;
use tb_bucket::ManualTicker;
use tb_bucket::MonotonicTicker;
use tb_bucket::RateLimiter;
use tb_bucket::RefillStrategy;
use tb_bucket::TokenBucket;

fn bench_try_consume_uncontended(c: &mut Criterion) {
    let bucket = TokenBucket::with_fixed_interval_refill(1_000_000, 1_000_000, Duration::from_micros(1), Arc::new(MonotonicTicker::new())).unwrap();

    c.bench_function("try_consume_uncontended", |b| {
        b.iter(|| black_box(bucket.try_consume(black_box(1)).unwrap()));
    });
}

fn bench_try_consume_exhausted(c: &mut Criterion) {
    // Clock never moves, so every attempt after the first is declined
    let bucket = TokenBucket::with_fixed_interval_refill(10, 1, Duration::from_secs(1), Arc::new(ManualTicker::new())).unwrap();

    c.bench_function("try_consume_exhausted", |b| {
        b.iter(|| black_box(bucket.try_consume(black_box(1)).unwrap()));
    });
}

fn bench_fixed_interval_refill(c: &mut Criterion) {
    let ticker = Arc::new(ManualTicker::new());
    let strategy = FixedIntervalRefillStrategy::new(ticker.clone(), 5, Duration::from_millis(10)).unwrap();

    c.bench_function("fixed_interval_refill", |b| {
        b.iter(|| {
            ticker.advance(Duration::from_millis(7));
            black_box(strategy.refill())
        });
    });
}

fn bench_try_consume_contended(c: &mut Criterion) {
    let bucket = Arc::new(TokenBucket::with_fixed_interval_refill(10_000, 10_000, Duration::from_micros(1), Arc::new(MonotonicTicker::new())).unwrap());

    c.bench_function("try_consume_contended_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    let bucket = &bucket;
                    scope.spawn(move || {
                        for _ in 0..250 {
                            black_box(bucket.try_consume(1).unwrap());
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(benches, bench_try_consume_uncontended, bench_try_consume_exhausted, bench_fixed_interval_refill, bench_try_consume_contended);
criterion_main!(benches);
