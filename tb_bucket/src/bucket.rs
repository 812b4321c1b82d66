use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::BucketError;
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::limiter::WaitFuture;
use crate::refill::FixedIntervalRefillStrategy;
use crate::refill::RefillStrategy;
use crate::ticker::MonotonicTicker;
use crate::ticker::Ticker;

/// Delay between consumption attempts while waiting
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Upper bound on a single wait before it is abandoned
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15 * 60);

/// Retry behaviour of the waiting consume operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Sleep between failed attempts
    pub retry_delay: Duration,

    /// Total time a single wait may spend before failing with `MaxWaitExceeded`
    pub max_wait: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self { retry_delay: DEFAULT_RETRY_DELAY, max_wait: DEFAULT_MAX_WAIT }
    }
}

/// Token bucket gating callers on an integer token count
///
/// The bucket starts empty and is replenished only by its refill strategy,
/// which is consulted on every consumption attempt. The count always stays
/// within `0..=capacity`: refills saturate at capacity instead of overflowing.
///
/// Waiters are not queued. When several tasks wait on the same bucket,
/// whichever retries first after a refill wins.
pub struct TokenBucket {
    /// Maximum number of tokens
    capacity: u64,

    /// Current number of tokens
    size: Mutex<u64>,

    refill_strategy: Arc<dyn RefillStrategy>,

    /// Latched once any wait had to sleep
    has_slept: AtomicBool,

    wait_policy: WaitPolicy,
}

impl TokenBucket {
    /// Create a bucket replenished by a caller-supplied strategy
    pub fn with_refill_strategy(capacity: u64, refill_strategy: Arc<dyn RefillStrategy>) -> Result<Self> {
        Self::from_parts(capacity, refill_strategy, WaitPolicy::default())
    }

    /// Create a bucket adding `refill_tokens` tokens every `period`
    pub fn with_fixed_interval_refill(capacity: u64, refill_tokens: u64, period: Duration, ticker: Arc<dyn Ticker>) -> Result<Self> {
        validate_capacity(capacity)?;
        let strategy = FixedIntervalRefillStrategy::new(ticker, refill_tokens, period)?;
        Self::from_parts(capacity, Arc::new(strategy), WaitPolicy::default())
    }

    /// Create a builder for configuring a token bucket
    pub fn builder() -> TokenBucketBuilder {
        TokenBucketBuilder::new()
    }

    fn from_parts(capacity: u64, refill_strategy: Arc<dyn RefillStrategy>, wait_policy: WaitPolicy) -> Result<Self> {
        validate_capacity(capacity)?;
        if wait_policy.retry_delay.is_zero() {
            return Err(BucketError::invalid("retry_delay", "must specify a non-zero retry delay"));
        }

        Ok(Self { capacity, size: Mutex::new(0), refill_strategy, has_slept: AtomicBool::new(false), wait_policy })
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }

    #[inline]
    fn validate_request(&self, num_tokens: u64) -> Result<()> {
        if num_tokens == 0 {
            return Err(BucketError::invalid("num_tokens", "number of tokens to consume must be positive"));
        }
        if num_tokens > self.capacity {
            return Err(BucketError::invalid("num_tokens", "number of tokens to consume must not exceed the capacity of the bucket"));
        }
        Ok(())
    }

    fn try_consume_internal(&self, num_tokens: u64) -> Result<bool> {
        self.validate_request(num_tokens)?;

        // The strategy takes and releases its own lock before ours is acquired
        let earned = self.refill_strategy.refill().min(self.capacity);

        let mut size = self.size.lock();
        *size = size.saturating_add(earned).min(self.capacity);

        if num_tokens > *size {
            return Ok(false);
        }

        *size -= num_tokens;
        Ok(true)
    }

    async fn wait_consume_internal(&self, num_tokens: u64, cancel: Option<CancellationToken>) -> Result<()> {
        self.validate_request(num_tokens)?;

        let entered = Instant::now();
        let WaitPolicy { retry_delay, max_wait } = self.wait_policy;

        loop {
            if self.try_consume_internal(num_tokens)? {
                return Ok(());
            }

            if !self.has_slept.swap(true, Ordering::AcqRel) {
                tracing::debug!(num_tokens, capacity = self.capacity, "Bucket exhausted, waiting for refill");
            }
            tracing::trace!(num_tokens, ?retry_delay, "Retrying consume after delay");

            match &cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(BucketError::Cancelled),
                        _ = tokio::time::sleep(retry_delay) => {}
                    }
                }
                None => tokio::time::sleep(retry_delay).await,
            }

            if entered.elapsed() > max_wait {
                return Err(BucketError::MaxWaitExceeded(max_wait));
            }

            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(BucketError::Cancelled);
            }
        }
    }
}

impl RateLimiter for TokenBucket {
    fn try_consume(&self, num_tokens: u64) -> Result<bool> {
        self.try_consume_internal(num_tokens)
    }

    fn wait_consume(&self, num_tokens: u64) -> WaitFuture<'_> {
        Box::pin(self.wait_consume_internal(num_tokens, None))
    }

    fn wait_consume_with_cancellation(&self, num_tokens: u64, cancel: CancellationToken) -> WaitFuture<'_> {
        Box::pin(self.wait_consume_internal(num_tokens, Some(cancel)))
    }

    fn has_slept(&self) -> bool {
        self.has_slept.load(Ordering::Acquire)
    }

    fn available(&self) -> u64 {
        *self.size.lock()
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

fn validate_capacity(capacity: u64) -> Result<()> {
    if capacity == 0 {
        return Err(BucketError::invalid("capacity", "must specify a positive number of tokens"));
    }
    Ok(())
}

/// Builder for configuring a token bucket
///
/// Either supply a refill strategy, or `refill_tokens` and `period` for a
/// fixed-interval strategy driven by `ticker` (a fresh [`MonotonicTicker`]
/// when not set).
pub struct TokenBucketBuilder {
    capacity: Option<u64>,
    refill_tokens: Option<u64>,
    period: Option<Duration>,
    refill_strategy: Option<Arc<dyn RefillStrategy>>,
    ticker: Option<Arc<dyn Ticker>>,
    wait_policy: WaitPolicy,
}

impl TokenBucketBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self { capacity: None, refill_tokens: None, period: None, refill_strategy: None, ticker: None, wait_policy: WaitPolicy::default() }
    }

    /// Set the bucket capacity (max tokens)
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the number of tokens added every period
    pub fn refill_tokens(mut self, refill_tokens: u64) -> Self {
        self.refill_tokens = Some(refill_tokens);
        self
    }

    /// Set the refill period
    pub fn period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Use a custom refill strategy instead of a fixed interval
    pub fn refill_strategy(mut self, refill_strategy: Arc<dyn RefillStrategy>) -> Self {
        self.refill_strategy = Some(refill_strategy);
        self
    }

    /// Set the clock driving the fixed-interval strategy
    pub fn ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = Some(ticker);
        self
    }

    /// Set the sleep between failed attempts while waiting
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.wait_policy.retry_delay = retry_delay;
        self
    }

    /// Set the maximum duration of a single wait
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.wait_policy.max_wait = max_wait;
        self
    }

    /// Build the token bucket
    pub fn build(self) -> Result<TokenBucket> {
        let capacity = self.capacity.ok_or(BucketError::invalid("capacity", "capacity must be set"))?;
        validate_capacity(capacity)?;

        let refill_strategy: Arc<dyn RefillStrategy> = match self.refill_strategy {
            Some(strategy) => {
                if self.refill_tokens.is_some() || self.period.is_some() {
                    return Err(BucketError::invalid("refill_strategy", "cannot be combined with refill_tokens or period"));
                }
                strategy
            }
            None => {
                let refill_tokens = self.refill_tokens.ok_or(BucketError::invalid("refill_tokens", "refill tokens or a refill strategy must be set"))?;
                let period = self.period.ok_or(BucketError::invalid("period", "period or a refill strategy must be set"))?;
                let ticker = self.ticker.unwrap_or_else(|| Arc::new(MonotonicTicker::new()));
                Arc::new(FixedIntervalRefillStrategy::new(ticker, refill_tokens, period)?)
            }
        };

        TokenBucket::from_parts(capacity, refill_strategy, self.wait_policy)
    }
}

impl Default for TokenBucketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
