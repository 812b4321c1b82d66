use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tb_bucket::BucketError;
use tb_bucket::RateLimiter;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of a throttled dispatch run
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub dispatched: u64,
    pub failed: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub has_slept: bool,
}

impl DispatchReport {
    /// Achieved dispatch rate in jobs per second
    pub fn jobs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 { self.dispatched as f64 } else { self.dispatched as f64 / secs }
    }
}

/// Dispatch `jobs` jobs across `workers` tasks, one token per job
///
/// Workers stop early once `cancel` fires. A worker whose wait fails for any
/// other reason records the failure and stops.
pub async fn run(limiter: Arc<dyn RateLimiter>, workers: usize, jobs: u64, cancel: CancellationToken) -> DispatchReport {
    let next_job = Arc::new(AtomicU64::new(0));
    let dispatched = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let handles: Vec<_> = (0..workers.max(1))
        .map(|worker| {
            let limiter = Arc::clone(&limiter);
            let next_job = Arc::clone(&next_job);
            let dispatched = Arc::clone(&dispatched);
            let failed = Arc::clone(&failed);
            let cancel = cancel.clone();

            tokio::spawn(async move {
                loop {
                    let job = next_job.fetch_add(1, Ordering::Relaxed);
                    if job >= jobs {
                        break;
                    }

                    match limiter.wait_consume_with_cancellation(1, cancel.clone()).await {
                        Ok(()) => {
                            dispatched.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(worker, job, "Dispatched job");
                        }
                        Err(BucketError::Cancelled) => {
                            tracing::debug!(worker, "Worker cancelled");
                            break;
                        }
                        Err(err) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::error!(worker, job, "Failed to acquire token: {err}");
                            break;
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!("Dispatch worker panicked: {err}");
        }
    }

    DispatchReport {
        dispatched: dispatched.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        cancelled: cancel.is_cancelled(),
        elapsed: started.elapsed(),
        has_slept: limiter.has_slept(),
    }
}
