use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config_loader::LoggingConfig;

/// Install the global subscriber described by `logging`
///
/// Always logs to stdout. When `log_dir` is set, also writes a daily rolling
/// `<file_name>.log` through a non-blocking appender; keep the returned guard
/// alive until shutdown so buffered lines are flushed.
pub fn init(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::builder().with_default_directive(logging.level().into()).from_env_lossy();
    let stdout_layer = fmt::layer().with_target(true).compact();

    let (file_layer, guard) = match logging.log_dir.as_deref() {
        Some(log_dir) => {
            let _ = std::fs::create_dir_all(log_dir);
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, format!("{}.log", logging.file_name)));
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_thread_ids(true).with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(env_filter).with(stdout_layer).with(file_layer).init();

    guard
}
