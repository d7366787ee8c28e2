//! Pure, order-preserving filtering of an activity view.

use crate::{
    entry::{ActivityLogEntry, EntryType, Platform, Severity},
    error::ValidationError,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Wire/UI keyword meaning "no constraint".
pub const ALL: &str = "all";

/// Conjunctive filter criteria. `None` passes every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryFilter {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Case-insensitive substring match against message, source and symbols
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: EntryType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then_some(search);
        self
    }

    /// Build a filter from UI selector values, where `"all"` or an empty string
    /// leaves the criterion unset.
    pub fn from_selectors(
        kind: Option<&str>,
        platform: Option<&str>,
        severity: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            kind: parse_selector(kind)?,
            platform: parse_selector(platform)?,
            severity: parse_selector(severity)?,
            search: None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.platform.is_none()
            && self.severity.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        self.kind.is_none_or(|kind| entry.kind == kind)
            && self.platform.is_none_or(|platform| entry.platform == platform)
            && self.severity.is_none_or(|severity| entry.severity == severity)
            && self
                .search
                .as_deref()
                .is_none_or(|search| matches_search(entry, search))
    }

    /// Lazily filter any borrowed sequence, preserving order
    pub fn apply<'a, I>(&'a self, entries: I) -> impl Iterator<Item = &'a ActivityLogEntry>
    where
        I: IntoIterator<Item = &'a ActivityLogEntry>,
    {
        entries.into_iter().filter(move |entry| self.matches(entry))
    }
}

/// Return the subsequence of `entries` matching `filter`, in input order.
pub fn filter<'a>(entries: &'a [ActivityLogEntry], filter: &EntryFilter) -> Vec<&'a ActivityLogEntry> {
    entries.iter().filter(|entry| filter.matches(entry)).collect()
}

fn parse_selector<T>(value: Option<&str>) -> Result<Option<T>, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case(ALL) => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

fn matches_search(entry: &ActivityLogEntry, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    entry.message.to_lowercase().contains(&needle)
        || entry.source.to_lowercase().contains(&needle)
        || entry
            .symbols
            .iter()
            .any(|symbol| symbol.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, kind: EntryType, platform: Platform, severity: Severity) -> ActivityLogEntry {
        let mut entry = ActivityLogEntry::new(kind, platform, "scanner", format!("event {id}"), severity);
        entry.id = id.to_string();
        entry
    }

    fn sample() -> Vec<ActivityLogEntry> {
        vec![
            entry("1", EntryType::RedditScan, Platform::Reddit, Severity::Info),
            entry("2", EntryType::Error, Platform::System, Severity::Error),
            entry("3", EntryType::PumpAlert, Platform::Twitter, Severity::Critical),
            entry("4", EntryType::ApiCall, Platform::Api, Severity::Error),
            entry("5", EntryType::RedditScan, Platform::Reddit, Severity::Warning),
        ]
    }

    fn ids(entries: &[&ActivityLogEntry]) -> Vec<String> {
        entries.iter().map(|entry| entry.id.clone()).collect()
    }

    #[test]
    fn test_severity_filter_is_pure_and_ordered() {
        let entries = sample();
        let before = entries.clone();

        let errors = filter(&entries, &EntryFilter::new().with_severity(Severity::Error));

        assert_eq!(ids(&errors), vec!["2", "4"]);
        assert!(errors.iter().all(|entry| entry.severity == Severity::Error));
        assert_eq!(entries, before);
    }

    #[test]
    fn test_criteria_are_conjunctive() {
        struct TestCase {
            filter: EntryFilter,
            expected: Vec<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: empty filter passes everything
                filter: EntryFilter::new(),
                expected: vec!["1", "2", "3", "4", "5"],
            },
            TestCase {
                // TC1: type only
                filter: EntryFilter::new().with_kind(EntryType::RedditScan),
                expected: vec!["1", "5"],
            },
            TestCase {
                // TC2: type AND severity
                filter: EntryFilter::new()
                    .with_kind(EntryType::RedditScan)
                    .with_severity(Severity::Warning),
                expected: vec!["5"],
            },
            TestCase {
                // TC3: platform AND severity with no overlap
                filter: EntryFilter::new()
                    .with_platform(Platform::Twitter)
                    .with_severity(Severity::Info),
                expected: vec![],
            },
            TestCase {
                // TC4: search over message
                filter: EntryFilter::new().with_search("EVENT 3"),
                expected: vec!["3"],
            },
        ];

        let entries = sample();
        for (index, test) in tests.into_iter().enumerate() {
            let actual = ids(&filter(&entries, &test.filter));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_from_selectors_treats_all_as_unset() {
        let filter = EntryFilter::from_selectors(Some("all"), Some(""), Some("ALL")).unwrap();
        assert!(filter.is_empty());

        let filter =
            EntryFilter::from_selectors(Some("pump_alert"), None, Some("critical")).unwrap();
        assert_eq!(filter.kind, Some(EntryType::PumpAlert));
        assert_eq!(filter.platform, None);
        assert_eq!(filter.severity, Some(Severity::Critical));

        assert!(EntryFilter::from_selectors(Some("bogus"), None, None).is_err());
    }

    #[test]
    fn test_search_matches_symbols() {
        let entries = vec![
            entry("1", EntryType::SymbolDetection, Platform::Reddit, Severity::Info)
                .with_symbols(["PEPE"]),
            entry("2", EntryType::SymbolDetection, Platform::Reddit, Severity::Info),
        ];

        let filter = EntryFilter::new().with_search("pepe");
        let found = filter
            .apply(&entries)
            .map(|entry| entry.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(found, vec!["1"]);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert!(EntryFilter::new().with_search("   ").is_empty());
    }
}
