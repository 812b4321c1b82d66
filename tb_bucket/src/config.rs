use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::bucket::TokenBucket;
use crate::error::Result;
use crate::ticker::Ticker;

/// Deserializable description of a fixed-interval token bucket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketConfig {
    /// Maximum number of tokens
    pub capacity: u64,

    /// Tokens added every period
    pub refill_tokens: u64,

    /// Refill period in milliseconds; the sign is ignored
    pub period_ms: i64,

    /// Sleep between attempts while waiting, defaults to 5ms
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,

    /// Maximum duration of a single wait, defaults to 15 minutes
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

impl BucketConfig {
    /// Refill period with the sign normalized away
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.unsigned_abs())
    }

    /// Build the configured bucket, reading time from `ticker`
    pub fn build(&self, ticker: Arc<dyn Ticker>) -> Result<TokenBucket> {
        let mut builder = TokenBucket::builder().capacity(self.capacity).refill_tokens(self.refill_tokens).period(self.period()).ticker(ticker);

        if let Some(retry_delay_ms) = self.retry_delay_ms {
            builder = builder.retry_delay(Duration::from_millis(retry_delay_ms));
        }
        if let Some(max_wait_secs) = self.max_wait_secs {
            builder = builder.max_wait(Duration::from_secs(max_wait_secs));
        }

        builder.build()
    }
}

impl Default for BucketConfig {
    /// 40 tokens, one token every 25ms
    fn default() -> Self {
        Self { capacity: 40, refill_tokens: 1, period_ms: 25, retry_delay_ms: None, max_wait_secs: None }
    }
}
