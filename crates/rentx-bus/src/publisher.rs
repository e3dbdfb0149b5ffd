//! # Event Publisher
//!
//! Publishing side of the session event stream.

use crate::events::{EventFilter, SessionEvent};
use crate::subscriber::{EventStream, Subscription, SubscriptionTicket};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Sink for session events.
///
/// Orchestrators hold an `Arc<dyn SessionPublisher>` and call it once per
/// transition.
#[async_trait]
pub trait SessionPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// Returns the number of subscribers that received it.
    async fn publish(&self, event: SessionEvent) -> usize;

    /// Total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory event bus on `tokio::sync::broadcast`.
pub struct InMemorySessionBus {
    sender: broadcast::Sender<SessionEvent>,

    /// Active subscription count by filter description.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    events_published: AtomicU64,

    capacity: usize,
}

impl InMemorySessionBus {
    /// Create a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    ///
    /// Only events published after this call are received.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = format!("{:?}/{:?}", filter.topics, filter.session_ids);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, sessions = ?filter.session_ids, "New subscription created");

        let ticket = SubscriptionTicket::new(self.subscriptions.clone(), key);
        Subscription::new(receiver, filter, ticket)
    }

    /// Subscribe and wrap the subscription in a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of tracked subscriptions across all filters.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.values().sum())
            .unwrap_or(0)
    }

    /// Per-subscriber channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemorySessionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionPublisher for InMemorySessionBus {
    async fn publish(&self, event: SessionEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let tag = event.tag;
        let session_id = event.session_id.clone();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(?tag, session_id = %session_id, receivers, "Event published");
                receivers
            }
            Err(_) => {
                debug!(?tag, session_id = %session_id, "Event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
