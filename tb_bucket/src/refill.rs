use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::BucketError;
use crate::error::Result;
use crate::ticker::Ticker;
use crate::ticker::duration_to_ticks;

/// Sentinel for a schedule that has never been consulted
const DUE_IMMEDIATELY: i64 = -1;

/// Policy deciding how many tokens a bucket has earned since it last asked
///
/// Implementations must be cheap and must not block for long: a bucket calls
/// `refill` on every consumption attempt.
pub trait RefillStrategy: Send + Sync {
    /// Number of tokens earned since the previous call
    fn refill(&self) -> u64;
}

/// Adds a fixed number of tokens once per elapsed period
///
/// The schedule advances in whole periods, so callers polling at irregular
/// intervals are credited exactly the periods that elapsed. Polling late
/// credits every missed period in one go.
///
/// The very first call always credits at least one period, which primes a
/// fresh bucket immediately.
///
/// Holds single-bucket schedule state: do not share one instance between
/// buckets.
pub struct FixedIntervalRefillStrategy {
    ticker: Arc<dyn Ticker>,
    tokens_per_period: u64,
    period: Duration,
    period_ticks: i64,
    /// Tick at which the next period is due
    next_refill_time: Mutex<i64>,
}

impl FixedIntervalRefillStrategy {
    /// Create a strategy crediting `tokens_per_period` tokens every `period`
    pub fn new(ticker: Arc<dyn Ticker>, tokens_per_period: u64, period: Duration) -> Result<Self> {
        if tokens_per_period == 0 {
            return Err(BucketError::invalid("tokens_per_period", "must specify a positive number of tokens"));
        }
        if period.is_zero() {
            return Err(BucketError::invalid("period", "must specify a non-zero period"));
        }
        let period_ticks = duration_to_ticks(period).ok_or(BucketError::invalid("period", "period does not fit in ticks"))?;

        Ok(Self { ticker, tokens_per_period, period, period_ticks, next_refill_time: Mutex::new(DUE_IMMEDIATELY) })
    }

    pub fn tokens_per_period(&self) -> u64 {
        self.tokens_per_period
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl RefillStrategy for FixedIntervalRefillStrategy {
    fn refill(&self) -> u64 {
        let mut next_refill_time = self.next_refill_time.lock();

        let now = self.ticker.read();
        if now < *next_refill_time {
            return 0;
        }

        let elapsed_periods = (now.saturating_sub(*next_refill_time) / self.period_ticks).max(1);
        *next_refill_time = next_refill_time.saturating_add(self.period_ticks.saturating_mul(elapsed_periods));

        tracing::trace!(elapsed_periods, next_refill_time = *next_refill_time, "Refill periods credited");

        // elapsed_periods >= 1 so the cast is lossless
        self.tokens_per_period.saturating_mul(elapsed_periods as u64)
    }
}
