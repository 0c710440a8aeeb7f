use interpreter_relay::tracing::{init_tracing, shutdown_tracing};
use interpreter_relay::{server, RelayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = RelayConfig::from_env();
    init_tracing("interpreter-relay", config.otlp_endpoint.as_deref())?;

    tracing::info!(
        interpreter = %config.interpreter_url,
        history_dir = %config.history_dir.display(),
        upload_dir = %config.upload_dir.display(),
        auto_run = config.auto_run,
        "Starting interpreter relay"
    );

    server::serve(config, shutdown_signal()).await?;

    shutdown_tracing();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
