use activity_telemetry::{ServerConfig, TelemetryService, logging::init_logging};
use std::error::Error;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    init_logging();

    info!("Starting activity telemetry server");

    // Configurable via ACTIVITY_* env vars, see ServerConfig
    let config = ServerConfig::from_env();
    info!(
        "Retaining {} entries, replaying {} per subscriber, {} queued per subscriber",
        config.capacity, config.backlog, config.subscriber_buffer
    );

    let service = TelemetryService::start(&config).await?;

    info!("Activity stream: ws://{}", service.stream_addr());
    info!("Activity API: http://{}", service.api_addr());
    info!("Dashboards can connect to receive real-time scanner activity");

    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Failed to listen for ctrl-c, shutting down");
    }

    info!("Shutdown requested");
    service.shutdown().await;
    Ok(())
}
