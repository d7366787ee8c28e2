use crate::{
    entry::ActivityLogEntry,
    error::TelemetryError,
    protocol::{
        ACTIVITY_PATH, ActivityCommand, ApiEnvelope, HEALTH_PATH, HealthReport, STATS_PATH,
    },
    stats::RollingStats,
};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the activity query and command endpoints
#[derive(Debug, Clone)]
pub struct ActivityApi {
    client: Client,
    base_url: String,
}

impl ActivityApi {
    /// Create a client for the server at `base_url` (eg/ "http://127.0.0.1:9003")
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch up to `limit` most recent entries, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, TelemetryError> {
        let url = format!("{}{}?limit={}", self.base_url, ACTIVITY_PATH, limit);
        let envelope = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<ApiEnvelope<Vec<ActivityLogEntry>>>()
            .await?;
        envelope.into_result()
    }

    /// Fetch rolling stats over the trailing `window_ms`
    pub async fn stats(&self, window_ms: i64) -> Result<RollingStats, TelemetryError> {
        let url = format!("{}{}?time_range={}", self.base_url, STATS_PATH, window_ms);
        let envelope = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<ApiEnvelope<RollingStats>>()
            .await?;
        envelope.into_result()
    }

    pub async fn health(&self) -> Result<HealthReport, TelemetryError> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let envelope = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<ApiEnvelope<HealthReport>>()
            .await?;
        envelope.into_result()
    }

    /// Empty the server-side store
    pub async fn clear(&self) -> Result<(), TelemetryError> {
        debug!(base_url = %self.base_url, "sending clear command");
        self.command(&ActivityCommand::Clear).await
    }

    /// Submit an entry as a producer. Invalid entries are refused before anything is sent:
    /// JSON has no encoding for non-finite metrics.
    pub async fn append(&self, entry: ActivityLogEntry) -> Result<(), TelemetryError> {
        entry.validate()?;
        self.command(&ActivityCommand::Log { entry }).await
    }

    async fn command(&self, command: &ActivityCommand) -> Result<(), TelemetryError> {
        let url = format!("{}{}", self.base_url, ACTIVITY_PATH);
        self.client
            .post(&url)
            .json(command)
            .send()
            .await?
            .json::<ApiEnvelope<()>>()
            .await?
            .into_ack()
    }
}
