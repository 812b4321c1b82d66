use std::time::Duration;

use thiserror::Error;

/// Result type for token bucket operations
pub type Result<T> = std::result::Result<T, BucketError>;

/// Errors surfaced by token bucket construction and consumption
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketError {
    /// A caller-supplied argument was out of range; nothing was mutated
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: &'static str },

    /// The cancellation token fired while waiting for tokens
    #[error("Wait for tokens was cancelled")]
    Cancelled,

    /// The refill strategy did not produce enough tokens within the wait bound
    #[error("Wait for tokens exceeded maximum delay of {0:?}")]
    MaxWaitExceeded(Duration),
}

impl BucketError {
    pub(crate) const fn invalid(name: &'static str, reason: &'static str) -> Self {
        BucketError::InvalidArgument { name, reason }
    }
}
