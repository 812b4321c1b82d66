use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Future returned by the waiting operations of a [`RateLimiter`]
pub type WaitFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Core capability of a token bucket
pub trait RateLimiter: Send + Sync {
    /// Try to consume `num_tokens` without blocking
    ///
    /// Returns `Ok(false)` when not enough tokens are available. Fails with
    /// `InvalidArgument` unless `1 <= num_tokens <= capacity`.
    fn try_consume(&self, num_tokens: u64) -> Result<bool>;

    /// Try to consume a single token without blocking
    fn try_consume_one(&self) -> Result<bool> {
        self.try_consume(1)
    }

    /// Wait until `num_tokens` can be consumed, then consume them
    fn wait_consume(&self, num_tokens: u64) -> WaitFuture<'_>;

    /// Wait for and consume a single token
    fn wait_consume_one(&self) -> WaitFuture<'_> {
        self.wait_consume(1)
    }

    /// Like [`RateLimiter::wait_consume`], giving up with `Cancelled` once `cancel` fires
    fn wait_consume_with_cancellation(&self, num_tokens: u64, cancel: CancellationToken) -> WaitFuture<'_>;

    /// Whether any wait on this limiter has ever had to sleep
    fn has_slept(&self) -> bool;

    /// Tokens currently held, without consulting the refill strategy
    fn available(&self) -> u64;

    /// Maximum number of tokens the limiter can hold
    fn capacity(&self) -> u64;
}
