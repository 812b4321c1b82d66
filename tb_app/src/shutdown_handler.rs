use tokio_util::sync::CancellationToken;

/// Sets up a Ctrl+C handler that cancels `token` on shutdown signal
pub fn setup(token: CancellationToken) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        token.cancel();
    })
}

