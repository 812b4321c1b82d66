use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

/// Monotonic clock consulted by refill strategies
///
/// One tick is one nanosecond. Readings must never go backwards.
pub trait Ticker: Send + Sync {
    /// Current reading in ticks
    fn read(&self) -> i64;
}

/// Wall-clock ticker backed by [`Instant`]
///
/// Reads nanoseconds elapsed since the ticker was created, so two tickers
/// built at different moments are not comparable with each other.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTicker {
    /// Epoch for relative time measurements
    epoch: Instant,
}

impl MonotonicTicker {
    /// Create a new ticker with the current instant as epoch
    #[inline(always)]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for MonotonicTicker {
    #[inline(always)]
    fn read(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Ticker that only moves when told to
///
/// Intended for deterministic tests: share it as `Arc<dyn Ticker>` with a
/// refill strategy and keep an `Arc<ManualTicker>` to drive time forward.
#[derive(Debug, Default)]
pub struct ManualTicker {
    now: AtomicI64,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `delta`, saturating at `i64::MAX`
    pub fn advance(&self, delta: Duration) {
        let ticks = duration_to_ticks(delta).unwrap_or(i64::MAX);
        let _ = self.now.fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| Some(now.saturating_add(ticks)));
    }

    /// Jump to an absolute reading
    pub fn set(&self, ticks: i64) {
        self.now.store(ticks, Ordering::Release);
    }
}

impl Ticker for ManualTicker {
    fn read(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Convert a duration to ticks, `None` if it does not fit in an `i64`
#[inline(always)]
pub fn duration_to_ticks(duration: Duration) -> Option<i64> {
    i64::try_from(duration.as_nanos()).ok()
}
