//! Core data types for activity telemetry
//!
//! These types match the JSON message format served by the activity stream and HTTP API.

use crate::error::ValidationError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Current wall-clock time in milliseconds since epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Kind of operational event observed by a scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    RedditScan,
    TwitterScan,
    SymbolDetection,
    PumpAlert,
    NewSymbol,
    HistoricalCheck,
    ApiCall,
    Error,
}

impl EntryType {
    pub const ALL: [EntryType; 8] = [
        EntryType::RedditScan,
        EntryType::TwitterScan,
        EntryType::SymbolDetection,
        EntryType::PumpAlert,
        EntryType::NewSymbol,
        EntryType::HistoricalCheck,
        EntryType::ApiCall,
        EntryType::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::RedditScan => "reddit_scan",
            EntryType::TwitterScan => "twitter_scan",
            EntryType::SymbolDetection => "symbol_detection",
            EntryType::PumpAlert => "pump_alert",
            EntryType::NewSymbol => "new_symbol",
            EntryType::HistoricalCheck => "historical_check",
            EntryType::ApiCall => "api_call",
            EntryType::Error => "error",
        }
    }
}

/// Platform an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Reddit,
    Twitter,
    System,
    Api,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Reddit,
        Platform::Twitter,
        Platform::System,
        Platform::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Twitter => "twitter",
            Platform::System => "system",
            Platform::Api => "api",
        }
    }
}

/// Severity of an event, used for colour and urgency mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
    Success,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::Success => "success",
        }
    }

    /// Counts towards the error rate
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    /// Urgency rank for display (0 = calm, 3 = page someone)
    pub fn urgency(&self) -> u8 {
        match self {
            Severity::Success | Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
            Severity::Critical => 3,
        }
    }
}

macro_rules! impl_display_from_str {
    ($($kind:ty),+) => {
        $(
            impl fmt::Display for $kind {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.pad(self.as_str())
                }
            }

            impl FromStr for $kind {
                type Err = ValidationError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$kind>::ALL
                        .into_iter()
                        .find(|variant| variant.as_str().eq_ignore_ascii_case(s.trim()))
                        .ok_or_else(|| {
                            ValidationError::Malformed(format!(
                                "unknown {} '{}'",
                                stringify!($kind),
                                s
                            ))
                        })
                }
            }
        )+
    };
}

impl_display_from_str!(EntryType, Platform, Severity);

/// Optional numeric payload attached to an entry
///
/// Well-known counters have named fields, anything else lands in `extra`. Every
/// value must be numeric on the wire and finite once decoded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl EntryMetrics {
    /// Iterate every present metric by wire name
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        [
            ("posts", self.posts),
            ("comments", self.comments),
            ("mentions", self.mentions),
            ("sentiment", self.sentiment),
            ("riskScore", self.risk_score),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .chain(self.extra.iter().map(|(name, value)| (name.as_str(), *value)))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, _)) => Err(ValidationError::NonFiniteMetric(name.to_string())),
            None => Ok(()),
        }
    }
}

/// One observed scanner event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    /// Unique identifier, assigned at creation
    pub id: String,
    /// Creation time in milliseconds since epoch
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub platform: Platform,
    /// Free-text origin label (eg/ subsystem name)
    pub source: String,
    pub message: String,
    pub severity: Severity,
    /// Ticker symbols referenced by the event
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EntryMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ActivityLogEntry {
    /// Create a new entry stamped with a fresh id and the current time
    pub fn new(
        kind: EntryType,
        platform: Platform,
        source: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let timestamp = now_millis();
        Self {
            id: format!("{}-{:08x}", timestamp, rand::random::<u32>()),
            timestamp,
            kind,
            platform,
            source: source.into(),
            message: message.into(),
            severity,
            symbols: Vec::new(),
            metrics: None,
            duration_ms: None,
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metrics(mut self, metrics: EntryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Decode an entry from JSON and validate it.
    ///
    /// Unknown `type`/`platform`/`severity` strings, non-numeric metrics and negative
    /// durations fail decoding and are reported as [`ValidationError::Malformed`].
    pub fn parse(json: &str) -> Result<Self, ValidationError> {
        let entry = serde_json::from_str::<Self>(json)
            .map_err(|error| ValidationError::Malformed(error.to_string()))?;
        entry.validate()?;
        Ok(entry)
    }

    /// Check the invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.timestamp <= 0 {
            return Err(ValidationError::InvalidTimestamp(self.timestamp));
        }
        if let Some(metrics) = &self.metrics {
            metrics.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_json(kind: &str, platform: &str, severity: &str) -> String {
        format!(
            r#"{{"id":"a1","timestamp":1700000000000,"type":"{kind}","platform":"{platform}",
               "source":"reddit-scanner","message":"scan done","severity":"{severity}"}}"#
        )
    }

    #[test]
    fn test_parse_valid_entry() {
        let json = r#"{
            "id": "1700000000000-00ff",
            "timestamp": 1700000000000,
            "type": "symbol_detection",
            "platform": "twitter",
            "source": "twitter-scanner",
            "message": "detected $PEPE",
            "severity": "success",
            "symbols": ["PEPE", "DOGE"],
            "metrics": {"mentions": 12, "sentiment": 0.7, "riskScore": 3, "velocity": 1.5},
            "durationMs": 240
        }"#;

        let entry = ActivityLogEntry::parse(json).unwrap();
        assert_eq!(entry.kind, EntryType::SymbolDetection);
        assert_eq!(entry.platform, Platform::Twitter);
        assert_eq!(entry.severity, Severity::Success);
        assert_eq!(entry.symbols, vec!["PEPE", "DOGE"]);
        assert_eq!(entry.duration_ms, Some(240));

        let metrics = entry.metrics.unwrap();
        assert_eq!(metrics.mentions, Some(12.0));
        assert_eq!(metrics.risk_score, Some(3.0));
        assert_eq!(metrics.extra.get("velocity"), Some(&1.5));
    }

    #[test]
    fn test_parse_rejects_unknown_enumerations() {
        struct TestCase {
            kind: &'static str,
            platform: &'static str,
            severity: &'static str,
            expected_ok: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: all known
                kind: "pump_alert",
                platform: "reddit",
                severity: "critical",
                expected_ok: true,
            },
            TestCase {
                // TC1: unknown type
                kind: "telegram_scan",
                platform: "reddit",
                severity: "info",
                expected_ok: false,
            },
            TestCase {
                // TC2: unknown platform
                kind: "api_call",
                platform: "discord",
                severity: "info",
                expected_ok: false,
            },
            TestCase {
                // TC3: unknown severity
                kind: "api_call",
                platform: "api",
                severity: "debug",
                expected_ok: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = ActivityLogEntry::parse(&entry_json(test.kind, test.platform, test.severity));
            assert_eq!(actual.is_ok(), test.expected_ok, "TC{} failed", index);
            if let Err(error) = actual {
                assert!(matches!(error, ValidationError::Malformed(_)), "TC{} failed", index);
            }
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_metric_and_negative_duration() {
        let bad_metric = r#"{"id":"x","timestamp":5,"type":"api_call","platform":"api",
            "source":"s","message":"m","severity":"info","metrics":{"posts":"many"}}"#;
        assert!(matches!(
            ActivityLogEntry::parse(bad_metric),
            Err(ValidationError::Malformed(_))
        ));

        let bad_duration = r#"{"id":"x","timestamp":5,"type":"api_call","platform":"api",
            "source":"s","message":"m","severity":"info","durationMs":-3}"#;
        assert!(matches!(
            ActivityLogEntry::parse(bad_duration),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate() {
        let mut entry = ActivityLogEntry::new(
            EntryType::ApiCall,
            Platform::Api,
            "coingecko",
            "GET /coins",
            Severity::Info,
        );
        assert!(entry.validate().is_ok());

        entry.id = "  ".to_string();
        assert_eq!(entry.validate(), Err(ValidationError::EmptyId));

        entry.id = "ok".to_string();
        entry.timestamp = 0;
        assert_eq!(entry.validate(), Err(ValidationError::InvalidTimestamp(0)));

        entry.timestamp = 1;
        entry.metrics = Some(EntryMetrics {
            sentiment: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(
            entry.validate(),
            Err(ValidationError::NonFiniteMetric("sentiment".to_string()))
        );
    }

    #[test]
    fn test_serialize_wire_names() {
        let entry = ActivityLogEntry::new(
            EntryType::RedditScan,
            Platform::Reddit,
            "reddit-scanner",
            "scanned r/cryptocurrency",
            Severity::Info,
        )
        .with_duration_ms(1200);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "reddit_scan");
        assert_eq!(value["platform"], "reddit");
        assert_eq!(value["durationMs"], 1200);
        assert!(value.get("symbols").is_none());
        assert!(value.get("metrics").is_none());
    }

    #[test]
    fn test_from_str_and_urgency() {
        assert_eq!("PUMP_ALERT".parse::<EntryType>(), Ok(EntryType::PumpAlert));
        assert_eq!("twitter".parse::<Platform>(), Ok(Platform::Twitter));
        assert!("fatal".parse::<Severity>().is_err());
        assert!(Severity::Critical.urgency() > Severity::Error.urgency());
        assert!(Severity::Critical.is_error());
        assert!(!Severity::Warning.is_error());
    }

    #[test]
    fn test_new_assigns_unique_ids() {
        let a = ActivityLogEntry::new(EntryType::Error, Platform::System, "s", "m", Severity::Error);
        let b = ActivityLogEntry::new(EntryType::Error, Platform::System, "s", "m", Severity::Error);
        assert_ne!(a.id, b.id);
        assert!(a.timestamp > 0);
    }
}
