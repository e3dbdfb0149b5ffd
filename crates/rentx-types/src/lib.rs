//! # RenTx Types Crate
//!
//! Session model for mint (lock-and-mint) and burn (burn-and-release)
//! transfers mediated by RenVM.
//!
//! ## Design Principles
//!
//! - **Plain data**: sessions and transactions carry no behaviour beyond
//!   read-only guards. Orchestrators own and mutate them.
//! - **Persistence contract**: every type here round-trips losslessly through
//!   serde. A caller may store the snapshot anywhere and hand it back later to
//!   resume.
//! - **Single writer**: a `GatewaySession`'s `transactions` map is written by
//!   the gateway orchestrator only. Deposit orchestrators publish copies.

pub mod amount;
pub mod entities;
pub mod errors;

pub use amount::{from_base_units, to_base_units};
pub use entities::*;
pub use errors::*;

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Orchestrators read the clock once per event and pass the value into the
/// pure transition functions.
#[must_use]
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
