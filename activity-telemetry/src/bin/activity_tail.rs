//! Headless activity feed consumer.
//!
//! Follows the activity stream, polls rolling stats and periodically logs the filtered
//! live view. Configuration comes from the environment:
//! - `ACTIVITY_WS_URL` (default: ws://127.0.0.1:9002)
//! - `ACTIVITY_API_URL` (default: http://127.0.0.1:9003)
//! - `ACTIVITY_MAX_LOGS` (default: 100)
//! - `ACTIVITY_FILTER_TYPE`, `ACTIVITY_FILTER_PLATFORM`, `ACTIVITY_FILTER_SEVERITY`
//!   (default: all)
//! - `ACTIVITY_FILTER_SEARCH` (default: none)

use activity_telemetry::{
    EntryFilter, Severity, StatsPoller, StatsPollerConfig, StreamClient, StreamClientConfig,
    client::DEFAULT_MAX_LOGS, logging::init_logging,
};
use std::{error::Error, time::Duration};
use tracing::{info, warn};

const RENDER_INTERVAL: Duration = Duration::from_secs(5);
const RENDER_ROWS: usize = 10;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn max_logs() -> usize {
    std::env::var("ACTIVITY_MAX_LOGS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_LOGS)
}

fn view_filter() -> Result<EntryFilter, Box<dyn Error>> {
    let kind = std::env::var("ACTIVITY_FILTER_TYPE").ok();
    let platform = std::env::var("ACTIVITY_FILTER_PLATFORM").ok();
    let severity = std::env::var("ACTIVITY_FILTER_SEVERITY").ok();

    let filter = EntryFilter::from_selectors(
        kind.as_deref(),
        platform.as_deref(),
        severity.as_deref(),
    )?;

    Ok(match std::env::var("ACTIVITY_FILTER_SEARCH") {
        Ok(search) => filter.with_search(search),
        Err(_) => filter,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let filter = view_filter()?;
    let config = StreamClientConfig::new(
        env_or("ACTIVITY_WS_URL", "ws://127.0.0.1:9002"),
        env_or("ACTIVITY_API_URL", "http://127.0.0.1:9003"),
    )
    .with_max_logs(max_logs());

    info!(
        url = %config.url,
        api_url = %config.api_url,
        max_logs = config.max_logs,
        ?filter,
        "Starting activity tail"
    );

    let client = StreamClient::start(config);
    let poller = StatsPoller::start(client.api().clone(), StatsPollerConfig::default());

    let mut render = tokio::time::interval(RENDER_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(error) = result {
                    warn!(%error, "Failed to listen for ctrl-c, shutting down");
                }
                break;
            }
            _ = render.tick() => {
                let stats = poller.latest();
                let view = client.entries(&filter);

                info!(
                    status = ?client.status(),
                    shown = view.len(),
                    paused = client.paused_len(),
                    total_logs = stats.total_logs,
                    error_rate = format!("{:.1}%", stats.error_rate * 100.0),
                    avg_duration_ms = format!("{:.0}", stats.avg_duration_ms),
                    unique_symbols = stats.unique_symbols,
                    "Activity"
                );

                for entry in view.iter().take(RENDER_ROWS) {
                    let row = format!(
                        "[{}] {:<16} {:<8} {:<8} {} {}",
                        entry.severity,
                        entry.kind,
                        entry.platform,
                        entry.source,
                        entry.message,
                        entry.symbols.join(",")
                    );
                    if entry.severity.urgency() >= Severity::Error.urgency() {
                        warn!("{row}");
                    } else {
                        info!("{row}");
                    }
                }
            }
        }
    }

    poller.shutdown().await;
    client.shutdown().await;
    info!("Activity tail stopped");
    Ok(())
}
