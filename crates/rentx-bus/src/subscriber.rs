//! # Event Subscriber
//!
//! Receiving side of the session event stream.

use crate::events::{EventFilter, SessionEvent};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Decrements the bus's subscription count when dropped.
pub(crate) struct SubscriptionTicket {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    key: String,
}

impl SubscriptionTicket {
    pub(crate) fn new(subscriptions: Arc<RwLock<HashMap<String, usize>>>, key: String) -> Self {
        Self { subscriptions, key }
    }
}

impl Drop for SubscriptionTicket {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        if let Some(count) = subs.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.key);
            }
        }
        debug!(filter = %self.key, "Subscription dropped");
    }
}

/// A subscription handle for receiving events.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    receiver: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
    _ticket: SubscriptionTicket,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<SessionEvent>,
        filter: EventFilter,
        ticket: SubscriptionTicket,
    ) -> Self {
        Self {
            receiver,
            filter,
            _ticket: ticket,
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Receive the next matching event without waiting.
    ///
    /// `Ok(None)` means nothing is queued right now.
    pub fn try_recv(&mut self) -> Result<Option<SessionEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

/// A `Stream` over a subscription.
pub struct EventStream {
    inner: BroadcastStream<SessionEvent>,
    filter: EventFilter,
    _ticket: SubscriptionTicket,
}

impl EventStream {
    /// Wrap a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            receiver,
            filter,
            _ticket: ticket,
        } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            _ticket: ticket,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
