//! Client-owned view of the activity stream.
//!
//! Holds the capped most-recent-first live list and the uncapped buffer that fills while the
//! view is paused. A bounded history of recently received ids outlives eviction from the
//! live list, so backlog replay after a reconnect neither shows an entry twice nor brings
//! back one the cap already pushed out.

use crate::{entry::ActivityLogEntry, filter::EntryFilter};
use fnv::FnvHashSet;
use std::collections::VecDeque;

/// Default number of entries a client keeps on screen.
pub const DEFAULT_MAX_LOGS: usize = 100;

/// Minimum number of received ids remembered for dedup, matching the default server
/// retention so any replayed backlog is recognised.
pub const DEFAULT_SEEN_HISTORY: usize = 1000;

/// Connection status of a stream client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Where an incoming entry was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Live,
    Buffered,
    /// Received before (shown, buffered or since evicted), dropped
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct ClientStreamState {
    status: ConnectionStatus,
    paused: bool,
    max_logs: usize,
    /// Front is newest
    live: VecDeque<ActivityLogEntry>,
    /// Front is newest, uncapped
    paused_buffer: VecDeque<ActivityLogEntry>,
    seen_ids: FnvHashSet<String>,
    /// Oldest first, bounded by `seen_capacity()`
    seen_order: VecDeque<String>,
}

impl ClientStreamState {
    pub fn new(max_logs: usize) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            paused: false,
            max_logs,
            live: VecDeque::with_capacity(max_logs),
            paused_buffer: VecDeque::new(),
            seen_ids: FnvHashSet::default(),
            seen_order: VecDeque::new(),
        }
    }

    /// Route an incoming entry to the live list or, while paused, to the paused buffer.
    pub fn receive(&mut self, entry: ActivityLogEntry) -> Received {
        if !self.remember(&entry.id) {
            return Received::Duplicate;
        }

        if self.paused {
            self.paused_buffer.push_front(entry);
            Received::Buffered
        } else {
            self.live.push_front(entry);
            self.truncate_live();
            Received::Live
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Flush the paused buffer in front of the live list and resume live updates.
    pub fn resume(&mut self) {
        // Buffer is newest-first: pushing oldest first leaves the newest at the front
        while let Some(entry) = self.paused_buffer.pop_back() {
            self.live.push_front(entry);
        }
        self.truncate_live();
        self.paused = false;
    }

    /// Empty the live list. Entries buffered during a pause are kept.
    pub fn clear_live(&mut self) {
        self.live.clear();
    }

    /// Change the cap. Shrinking truncates immediately, growing does not backfill.
    pub fn set_max_logs(&mut self, max_logs: usize) {
        self.max_logs = max_logs;
        self.truncate_live();
    }

    /// Live entries passing `filter`, newest first
    pub fn view(&self, filter: &EntryFilter) -> Vec<ActivityLogEntry> {
        filter.apply(&self.live).cloned().collect()
    }

    pub fn live_entries(&self) -> impl Iterator<Item = &ActivityLogEntry> {
        self.live.iter()
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn paused_len(&self) -> usize {
        self.paused_buffer.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn max_logs(&self) -> usize {
        self.max_logs
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    fn truncate_live(&mut self) {
        self.live.truncate(self.max_logs);
    }

    /// Never smaller than what is currently held, so a held id is always remembered
    fn seen_capacity(&self) -> usize {
        DEFAULT_SEEN_HISTORY
            .max(self.max_logs)
            .max(self.live.len() + self.paused_buffer.len() + 1)
    }

    /// Record `id`, returning false if it was already seen
    fn remember(&mut self, id: &str) -> bool {
        if self.seen_ids.contains(id) {
            return false;
        }
        self.seen_ids.insert(id.to_string());
        self.seen_order.push_back(id.to_string());

        let capacity = self.seen_capacity();
        while self.seen_order.len() > capacity {
            if let Some(forgotten) = self.seen_order.pop_front() {
                self.seen_ids.remove(&forgotten);
            }
        }
        true
    }
}

impl Default for ClientStreamState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGS)
    }
}
