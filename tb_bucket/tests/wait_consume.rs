//! Integration tests for the waiting consume protocol
//!
//! Most tests run on tokio's paused clock so retry delays and refill
//! periods elapse instantly and deterministically.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tb_bucket::BucketError;
use tb_bucket::CancellationToken;
use tb_bucket::RateLimiter;
use tb_bucket::RefillStrategy;
use tb_bucket::Ticker;
use tb_bucket::TokenBucket;
use tokio::time::Instant;

/// Hands out exactly the tokens it was told to add
#[derive(Default)]
struct ManualRefill {
    pending: AtomicU64,
}

impl ManualRefill {
    fn add_tokens(&self, num_tokens: u64) {
        self.pending.fetch_add(num_tokens, Ordering::AcqRel);
    }
}

impl RefillStrategy for ManualRefill {
    fn refill(&self) -> u64 {
        self.pending.swap(0, Ordering::AcqRel)
    }
}

/// Ticker following tokio's clock, so it honours a paused runtime
struct TokioTicker {
    epoch: Instant,
}

impl Ticker for TokioTicker {
    fn read(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

fn manual_bucket(capacity: u64) -> (Arc<ManualRefill>, Arc<TokenBucket>) {
    let strategy = Arc::new(ManualRefill::default());
    let bucket = TokenBucket::with_refill_strategy(capacity, strategy.clone()).unwrap();
    (strategy, Arc::new(bucket))
}

#[tokio::test(start_paused = true)]
async fn test_wait_converges_once_tokens_are_added() {
    const TOKENS_TO_CONSUME: u64 = 7;
    let (strategy, bucket) = manual_bucket(10);

    let consumer = tokio::spawn({
        let bucket = bucket.clone();
        async move { bucket.wait_consume(TOKENS_TO_CONSUME).await }
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!consumer.is_finished());

    strategy.add_tokens(TOKENS_TO_CONSUME);
    consumer.await.unwrap().unwrap();

    assert!(bucket.has_slept());
    assert_eq!(bucket.available(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_waiting() {
    let (strategy, bucket) = manual_bucket(10);
    strategy.add_tokens(5);
    let cancel = CancellationToken::new();

    let consumer = tokio::spawn({
        let bucket = bucket.clone();
        let cancel = cancel.clone();
        async move { bucket.wait_consume_with_cancellation(7, cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    assert_eq!(consumer.await.unwrap(), Err(BucketError::Cancelled));
    // No partial debit
    assert_eq!(bucket.available(), 5);
    assert!(bucket.has_slept());
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_does_not_block_available_tokens() {
    let (strategy, bucket) = manual_bucket(10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    strategy.add_tokens(1);
    bucket.wait_consume_with_cancellation(1, cancel.clone()).await.unwrap();
    assert!(!bucket.has_slept());

    assert_eq!(bucket.wait_consume_with_cancellation(1, cancel).await, Err(BucketError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_max_wait_exceeded() {
    let strategy = Arc::new(ManualRefill::default());
    let bucket = TokenBucket::builder().capacity(10).refill_strategy(strategy).max_wait(Duration::from_secs(1)).build().unwrap();

    let started = Instant::now();
    assert_eq!(bucket.wait_consume_one().await, Err(BucketError::MaxWaitExceeded(Duration::from_secs(1))));
    assert!(started.elapsed() > Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_default_max_wait_is_fifteen_minutes() {
    let (_strategy, bucket) = manual_bucket(10);

    let started = Instant::now();
    assert_eq!(bucket.wait_consume_one().await, Err(BucketError::MaxWaitExceeded(Duration::from_secs(15 * 60))));
    assert!(started.elapsed() > Duration::from_secs(15 * 60));
}

#[tokio::test(start_paused = true)]
async fn test_waiters_race_for_scarce_tokens() {
    let (strategy, bucket) = manual_bucket(10);

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let bucket = bucket.clone();
            tokio::spawn(async move { bucket.wait_consume_one().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    strategy.add_tokens(1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Either waiter may win, but only one can
    assert_eq!(waiters.iter().filter(|w| w.is_finished()).count(), 1);

    strategy.add_tokens(1);
    for waiter in waiters {
        waiter.await.unwrap().unwrap();
    }
    assert_eq!(bucket.available(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_interval_throughput() {
    const TOTAL_CONSUMES: u64 = 500;
    const PERIOD: Duration = Duration::from_millis(25);

    let ticker = Arc::new(TokioTicker { epoch: Instant::now() });
    let bucket = TokenBucket::with_fixed_interval_refill(40, 1, PERIOD, ticker).unwrap();

    let started = Instant::now();
    for _ in 0..TOTAL_CONSUMES {
        bucket.wait_consume_one().await.unwrap();
    }
    let elapsed = started.elapsed();

    // The first token is primed immediately, every other one waits a period
    let expected = PERIOD * (TOTAL_CONSUMES as u32 - 1);
    assert!(elapsed >= expected, "Expected at least {expected:?}, got {elapsed:?}");
    assert!(elapsed < expected + Duration::from_millis(100), "Expected about {expected:?}, got {elapsed:?}");
    assert!(bucket.has_slept());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_waiters_consume_exactly_what_is_refilled() {
    const WAITERS: u64 = 8;
    const PER_WAITER: u64 = 25;

    let strategy = Arc::new(ManualRefill::default());
    // A lost refill fails fast instead of waiting out the default bound
    let bucket =
        Arc::new(TokenBucket::builder().capacity(10).refill_strategy(strategy.clone()).max_wait(Duration::from_secs(5)).build().unwrap());
    let consumed = Arc::new(AtomicU64::new(0));

    let waiters: Vec<_> = (0..WAITERS)
        .map(|_| {
            let bucket = bucket.clone();
            let consumed = consumed.clone();
            tokio::spawn(async move {
                for _ in 0..PER_WAITER {
                    bucket.wait_consume_one().await?;
                    consumed.fetch_add(1, Ordering::AcqRel);
                }
                Ok::<_, BucketError>(())
            })
        })
        .collect();

    // Only top up once every added token was consumed, so no refill is clamped away
    let mut added = 0;
    while added < WAITERS * PER_WAITER {
        if consumed.load(Ordering::Acquire) == added {
            strategy.add_tokens(10);
            added += 10;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    for waiter in waiters {
        waiter.await.unwrap().unwrap();
    }

    // Everything refilled was consumed, nothing more
    assert!(!bucket.try_consume(1).unwrap());
    assert_eq!(bucket.available(), 0);
}
