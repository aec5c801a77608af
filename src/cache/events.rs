//! Cache event notifications.
//!
//! Every state change the sync layer makes is published as a `CacheEvent` on
//! a broadcast channel. Views subscribe to learn that a query was invalidated
//! (and should be re-read) or that a mutation settled.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use super::keys::{MutationKey, QueryKey};

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotent handling.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    // Queries
    /// New pages were stored for a query.
    QueryUpdated { key: QueryKey },
    /// A query failed; its previous pages are still cached.
    QueryFailed { key: QueryKey, message: String },
    /// A query was marked stale and will refetch on next read.
    QueryInvalidated { key: QueryKey },

    // Mutations
    MutationStarted { key: MutationKey },
    MutationSucceeded { key: MutationKey },
    MutationFailed { key: MutationKey, message: String },
    /// Rejected because an execution with the same key was in flight.
    MutationRejected { key: MutationKey },
}

/// Process-wide broadcast channel for cache events.
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
    epoch_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event to current subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is only
    /// logged.
    pub fn publish(&self, kind: EventKind) -> Epoch {
        let event = CacheEvent::new(kind, self.next_epoch());
        let epoch = event.epoch;

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event published"
        );

        if self.sender.send(event).is_err() {
            debug!(event_epoch = epoch, "No cache event subscribers");
        }
        epoch
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::cache::CacheConfig::default().event_capacity)
    }
}
