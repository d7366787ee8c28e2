//! Fan-out hub pushing freshly appended entries to every live subscriber.
//!
//! Each subscriber reads from its own cursor into a bounded ring. A subscriber that falls
//! more than `capacity` entries behind loses the oldest ones and is told how many via
//! [`Delivery::Lagged`]. Lost deliveries are never retried.

use crate::entry::ActivityLogEntry;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of undelivered entries buffered per subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Item handed to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Entry(ActivityLogEntry),
    /// Subscriber fell behind and this many entries were dropped
    Lagged(u64),
}

#[derive(Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<ActivityLogEntry>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new(subscriber_buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(subscriber_buffer.max(1));
        Self {
            tx,
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber. The returned handle only sees entries published after
    /// this call.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(subscriber = id, "subscribed to activity broadcast");
        Subscription {
            id,
            rx: self.tx.subscribe(),
        }
    }

    /// Deliver an entry to every current subscriber, returning how many were reached.
    ///
    /// Never waits: a full subscriber queue overwrites its oldest slot.
    pub fn publish(&self, entry: ActivityLogEntry) -> usize {
        // Err only means there are no subscribers right now
        self.tx.send(entry).unwrap_or(0)
    }

    /// Remove a subscriber and release its queue.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Handle to one subscriber channel. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: broadcast::Receiver<ActivityLogEntry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next delivery. Returns `None` once the [`Broadcaster`] is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.rx.recv().await {
            Ok(entry) => Some(Delivery::Entry(entry)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Some(Delivery::Lagged(skipped)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Take the next delivery if one is already queued.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        match self.rx.try_recv() {
            Ok(entry) => Some(Delivery::Entry(entry)),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => Some(Delivery::Lagged(skipped)),
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                None
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(subscriber = self.id, "unsubscribed from activity broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryType, Platform, Severity};

    fn entry(id: &str) -> ActivityLogEntry {
        let mut entry = ActivityLogEntry::new(
            EntryType::ApiCall,
            Platform::Api,
            "test",
            "call",
            Severity::Info,
        );
        entry.id = id.to_string();
        entry
    }

    fn ids(subscription: &mut Subscription) -> Vec<String> {
        std::iter::from_fn(|| subscription.try_recv())
            .filter_map(|delivery| match delivery {
                Delivery::Entry(entry) => Some(entry.id),
                Delivery::Lagged(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_new_subscription_starts_empty() {
        let broadcaster = Broadcaster::new(8);
        broadcaster.publish(entry("before"));

        let mut subscription = broadcaster.subscribe();
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn test_publish_fans_out_to_all_subscribers() {
        let broadcaster = Broadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        assert_ne!(first.id(), second.id());

        assert_eq!(broadcaster.publish(entry("a")), 2);
        assert_eq!(broadcaster.publish(entry("b")), 2);

        assert_eq!(ids(&mut first), vec!["a", "b"]);
        assert_eq!(ids(&mut second), vec!["a", "b"]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::default();
        assert_eq!(broadcaster.publish(entry("a")), 0);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest_without_blocking_others() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        broadcaster.publish(entry("a"));
        assert_eq!(ids(&mut fast), vec!["a"]);
        broadcaster.publish(entry("b"));
        assert_eq!(ids(&mut fast), vec!["b"]);
        broadcaster.publish(entry("c"));
        assert_eq!(ids(&mut fast), vec!["c"]);

        assert_eq!(slow.try_recv(), Some(Delivery::Lagged(1)));
        assert_eq!(ids(&mut slow), vec!["b", "c"]);
    }

    #[test]
    fn test_unsubscribe_releases_channel() {
        let broadcaster = Broadcaster::new(4);
        let first = broadcaster.subscribe();
        let _second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.unsubscribe(first);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.publish(entry("a")), 1);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_broadcaster_dropped() {
        let broadcaster = Broadcaster::new(4);
        let mut subscription = broadcaster.subscribe();
        broadcaster.publish(entry("last"));
        drop(broadcaster);

        assert!(matches!(subscription.recv().await, Some(Delivery::Entry(e)) if e.id == "last"));
        assert_eq!(subscription.recv().await, None);
    }
}
