//! # Actors
//!
//! Tokio tasks that execute the machines in [`crate::machines`]. Each actor
//! owns its state and a mailbox; adapter calls run as separate operation
//! tasks and report back through the same mailbox.
//!
//! ```text
//! GatewayOrchestrator ─┬─ DepositListener (one per gateway)
//!                      └─ deposit actor   (one per transaction)
//! BurnOrchestrator
//! ```

mod burn;
mod deposit;
mod gateway;
mod listener;
pub(crate) mod messages;
mod operations;

pub use burn::{BurnHandle, BurnOrchestrator, BurnOutcome};
pub use gateway::{GatewayHandle, GatewayOrchestrator, GatewayOutcome};
