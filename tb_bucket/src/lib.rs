//! # tb_bucket
//!
//! Token bucket rate limiter with pluggable refill strategies.
//!
//! A [`TokenBucket`] holds up to `capacity` tokens and consults its
//! [`RefillStrategy`] on every consumption attempt. Callers either try to
//! consume without blocking or wait, asynchronously, until enough tokens
//! have been refilled.

pub mod bucket;
pub mod config;
pub mod error;
pub mod limiter;
pub mod refill;
pub mod ticker;

pub use bucket::TokenBucket;
pub use bucket::TokenBucketBuilder;
pub use bucket::WaitPolicy;
pub use config::BucketConfig;
pub use error::BucketError;
pub use error::Result;
pub use limiter::RateLimiter;
pub use refill::FixedIntervalRefillStrategy;
pub use refill::RefillStrategy;
pub use ticker::ManualTicker;
pub use ticker::MonotonicTicker;
pub use ticker::Ticker;
pub use tokio_util::sync::CancellationToken;
