//! # RenTx Bus - Session Event Stream
//!
//! Every orchestrator transition publishes a [`SessionEvent`]: a read-only
//! snapshot of the session plus a typed [`EventTag`]. Callers subscribe to
//! persist snapshots, drive a UI, or decide when to send `CLAIM`,
//! `ACKNOWLEDGE`, `REJECT` or `RETRY` back in.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  subscribe()  ┌──────────┐
//! │ Orchestrator │ ────────────▶ │  Event Bus   │ ────────────▶ │  Caller  │
//! └──────────────┘               └──────────────┘               └──────────┘
//! ```
//!
//! Snapshots are clones. Mutating a received snapshot never reaches the
//! orchestrator that emitted it.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTag, EventTopic, SessionEvent, SessionSnapshot};
pub use publisher::{InMemorySessionBus, SessionPublisher};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
