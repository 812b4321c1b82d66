use std::sync::Arc;

use tb_app::cli;
use tb_app::config_loader;
use tb_app::config_loader::ThrottleConfigFile;
use tb_app::dispatcher;
use tb_app::shutdown_handler;
use tb_app::tracing_setup;
use tb_bucket::MonotonicTicker;
use tb_bucket::RateLimiter;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "tb_app/config/throttle.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli::get_config_path(DEFAULT_CONFIG_PATH);
    let loaded = config_loader::load_throttle_config(&config_path);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ThrottleConfigFile::default(),
    };

    // Subscriber depends on the [logging] table, so report the load outcome afterwards
    let _guard = tracing_setup::init(&config.logging);
    match loaded {
        Ok(_) => info!("Loaded throttle config from {config_path}"),
        Err(err) => warn!("Failed to load throttle config from {}: {}. Using defaults.", config_path, err),
    }

    let bucket = config.bucket.build(Arc::new(MonotonicTicker::new()))?;
    info!(
        name = %config.name,
        capacity = bucket.capacity(),
        refill_tokens = config.bucket.refill_tokens,
        period = ?config.bucket.period(),
        "Token bucket ready"
    );

    let cancel = CancellationToken::new();
    shutdown_handler::setup(cancel.clone())?;

    let report = dispatcher::run(Arc::new(bucket), config.workers, config.jobs, cancel).await;

    info!(
        dispatched = report.dispatched,
        elapsed = ?report.elapsed,
        jobs_per_second = report.jobs_per_second(),
        has_slept = report.has_slept,
        "Dispatch finished"
    );
    if report.cancelled {
        warn!("Dispatch cancelled before all {} jobs were sent", config.jobs);
    }
    if report.failed > 0 {
        warn!("{} workers gave up waiting for tokens", report.failed);
    }

    Ok(())
}
