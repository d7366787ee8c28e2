//! Rolling-window statistics over the activity store
//!
//! Stats are recomputed from scratch on every query rather than maintained incrementally,
//! so a frozen store always yields the same result for the same window and instant.

use crate::{
    entry::{ActivityLogEntry, EntryType, Platform, Severity, now_millis},
    store::EventStore,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

/// Default trailing window for stats queries (1 hour).
pub const DEFAULT_WINDOW_MS: i64 = 60 * 60 * 1000;

/// Aggregated counters for one trailing window
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingStats {
    pub total_logs: usize,
    pub by_type: BTreeMap<EntryType, usize>,
    pub by_platform: BTreeMap<Platform, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    /// Mean over entries that carry a duration, 0 if none do
    pub avg_duration_ms: f64,
    /// Sum of symbol counts, duplicates included
    pub total_symbols: usize,
    pub unique_symbols: usize,
    /// Share of error + critical entries, 0 for an empty window
    pub error_rate: f64,
    pub window_ms: i64,
    /// Evaluation instant the window was anchored to
    pub generated_at: i64,
}

/// Compute [`RollingStats`] over entries with `now - window_ms <= timestamp <= now`.
pub fn rolling_stats<'a, I>(entries: I, window_ms: i64, now: i64) -> RollingStats
where
    I: IntoIterator<Item = &'a ActivityLogEntry>,
{
    let cutoff = now.saturating_sub(window_ms.max(0));

    let mut stats = RollingStats {
        window_ms,
        generated_at: now,
        ..Default::default()
    };
    let mut unique_symbols = HashSet::new();
    let mut duration_sum = 0u64;
    let mut duration_count = 0u64;
    let mut errors = 0usize;

    for entry in entries
        .into_iter()
        .filter(|entry| entry.timestamp >= cutoff && entry.timestamp <= now)
    {
        stats.total_logs += 1;
        *stats.by_type.entry(entry.kind).or_insert(0) += 1;
        *stats.by_platform.entry(entry.platform).or_insert(0) += 1;
        *stats.by_severity.entry(entry.severity).or_insert(0) += 1;

        if let Some(duration) = entry.duration_ms {
            duration_sum = duration_sum.saturating_add(duration);
            duration_count += 1;
        }

        stats.total_symbols += entry.symbols.len();
        unique_symbols.extend(entry.symbols.iter().map(String::as_str));

        if entry.severity.is_error() {
            errors += 1;
        }
    }

    stats.unique_symbols = unique_symbols.len();
    stats.avg_duration_ms = if duration_count > 0 {
        duration_sum as f64 / duration_count as f64
    } else {
        0.0
    };
    stats.error_rate = if stats.total_logs > 0 {
        errors as f64 / stats.total_logs as f64
    } else {
        0.0
    };

    stats
}

/// Stateless view computing [`RollingStats`] from an [`EventStore`] on demand
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    store: Arc<EventStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// Stats over the trailing `window_ms`, anchored at the current instant
    pub fn compute(&self, window_ms: i64) -> RollingStats {
        self.compute_at(window_ms, now_millis())
    }

    /// Stats over the trailing `window_ms`, anchored at `now`
    pub fn compute_at(&self, window_ms: i64, now: i64) -> RollingStats {
        rolling_stats(&self.store.snapshot(), window_ms, now)
    }
}
