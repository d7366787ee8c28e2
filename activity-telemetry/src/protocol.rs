//! Wire messages shared by the activity server and its clients
//!
//! Stream frames are JSON text messages tagged by `type`. HTTP responses are wrapped in a
//! `success`/`data` envelope.

use crate::{entry::ActivityLogEntry, error::TelemetryError};
use serde::{Deserialize, Serialize};

/// Recent-entries query and command endpoint
pub const ACTIVITY_PATH: &str = "/api/activity";
/// Rolling stats query endpoint
pub const STATS_PATH: &str = "/api/activity/stats";
/// Liveness endpoint
pub const HEALTH_PATH: &str = "/api/health";

/// Default `limit` for recent queries
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Frame pushed from the stream endpoint to a subscriber
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// First frame on every connection
    Connected { timestamp: i64 },
    /// One activity entry, replayed or live
    Log { data: ActivityLogEntry },
}

/// Body of `POST /api/activity` (and of text frames a subscriber may send)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActivityCommand {
    Clear,
    Log { entry: ActivityLogEntry },
}

/// `{ success, data?, error? }` response envelope
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Unwrap the payload, turning `success: false` or a missing payload into an error
    pub fn into_result(self) -> Result<T, TelemetryError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(TelemetryError::Api("response carried no data".to_string())),
            (false, _) => Err(TelemetryError::Api(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

impl ApiEnvelope<()> {
    /// Bare acknowledgement with no payload
    pub fn ack() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn into_ack(self) -> Result<(), TelemetryError> {
        if self.success {
            Ok(())
        } else {
            Err(TelemetryError::Api(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Payload of `GET /api/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct HealthReport {
    /// Entries currently retained
    pub entries: usize,
    /// Open stream subscriptions
    pub subscribers: usize,
}
