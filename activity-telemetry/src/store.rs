//! Bounded in-memory retention of the most recent activity entries.
//!
//! The store is the single writer in front of the [`Broadcaster`]: every successful append
//! is published while the writer lock is still held, so store order and broadcast order
//! are the same sequence and a subscriber registered under the lock sees neither a gap nor
//! a duplicate between its backlog and its live feed.

use crate::{
    broadcast::{Broadcaster, Subscription},
    entry::ActivityLogEntry,
    error::ValidationError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Default number of entries retained server-side.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct EventStore {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityLogEntry>>,
    broadcaster: Broadcaster,
}

impl EventStore {
    pub fn new(capacity: usize, broadcaster: Broadcaster) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            broadcaster,
        }
    }

    /// Validate and append an entry, evicting the oldest on overflow, then notify every
    /// subscriber before returning.
    pub fn append(&self, entry: ActivityLogEntry) -> Result<(), ValidationError> {
        entry.validate()?;

        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());

        let reached = self.broadcaster.publish(entry);
        debug!(
            retained = entries.len(),
            subscribers = reached,
            "appended activity entry"
        );
        Ok(())
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Snapshot of every retained entry in arrival order (oldest first).
    pub fn snapshot(&self) -> Vec<ActivityLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Register a subscriber together with the last `backlog` entries, oldest first.
    ///
    /// Both happen under the writer lock: an entry is either part of the backlog or will
    /// arrive on the subscription, never both and never neither.
    pub fn subscribe_with_backlog(&self, backlog: usize) -> (Vec<ActivityLogEntry>, Subscription) {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(backlog);
        let replay = entries.iter().skip(skip).cloned().collect();
        let subscription = self.broadcaster.subscribe();
        (replay, subscription)
    }

    /// Empty the buffer. Subscribers are not notified.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let cleared = entries.len();
        entries.clear();
        info!(cleared, "cleared activity store");
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.broadcaster.unsubscribe(subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Broadcaster::default())
    }
}
