//! # RenTx Test Suite
//!
//! End-to-end flows across the session bus, the orchestrators and the
//! in-memory chains.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Harness, sessions, event waiting
//! └── integration/
//!     ├── mint_flow.rs  # Deposit detection through acknowledgement
//!     ├── burn_flow.rs  # Burn through release
//!     └── restore.rs    # Snapshots fed back into new orchestrators
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rentx-tests
//! cargo test -p rentx-tests integration::restore::
//! ```

pub mod fixtures;
pub mod integration;
