use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an [`ActivityLogEntry`](crate::entry::ActivityLogEntry) is refused at the producer
/// boundary. A rejected entry never enters the store.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum ValidationError {
    #[error("entry id must not be empty")]
    EmptyId,

    #[error("entry timestamp must be positive milliseconds since epoch, got {0}")]
    InvalidTimestamp(i64),

    #[error("metric '{0}' is not a finite number")]
    NonFiniteMetric(String),

    #[error("malformed entry: {0}")]
    Malformed(String),
}

/// All errors generated in `activity-telemetry`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum TelemetryError {
    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("HttpError: {0}")]
    Http(String),

    #[error("api responded with failure: {0}")]
    Api(String),

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("SerDe error: {0}")]
    Serde(String),
}

impl TelemetryError {
    /// Determine if an error means the stream connection is gone and must be re-established.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            TelemetryError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                // ConnectionClosed, AlreadyClosed and closing frames
                error_lower.contains("closed")
                    || error_lower.contains("io(")
                    || error_lower.contains("timeout")
            }
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TelemetryError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(format!("{value:?}"))
    }
}

impl From<reqwest::Error> for TelemetryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_error_is_terminal() {
        struct TestCase {
            input: TelemetryError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: validation errors never tear down a connection
                input: TelemetryError::from(ValidationError::EmptyId),
                expected: false,
            },
            TestCase {
                // TC1: ConnectionClosed is terminal
                input: TelemetryError::Socket("ConnectionClosed".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: io errors indicate network disconnection
                input: TelemetryError::Socket("Io(Kind(UnexpectedEof))".to_string()),
                expected: true,
            },
            TestCase {
                // TC3: read timeout indicates silent stream death
                input: TelemetryError::Socket("read timeout after 120s".to_string()),
                expected: true,
            },
            TestCase {
                // TC4: capacity errors on a single frame are not terminal
                input: TelemetryError::Socket("Capacity(MessageTooLong)".to_string()),
                expected: false,
            },
            TestCase {
                // TC5: http failures belong to the poller, not the stream
                input: TelemetryError::Http("connection refused".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::InvalidTimestamp(-4).to_string(),
            "entry timestamp must be positive milliseconds since epoch, got -4"
        );
        assert_eq!(
            TelemetryError::from(ValidationError::NonFiniteMetric("sentiment".into())).to_string(),
            "ValidationError: metric 'sentiment' is not a finite number"
        );
    }
}
