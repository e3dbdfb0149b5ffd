//! # RenTx Telemetry
//!
//! Structured logging for orchestrators, built on `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rentx_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // orchestrators now log with session and deposit fields
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RENTX_SERVICE_NAME` | `rentx` | Service name attached to logs |
//! | `RENTX_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `RENTX_JSON_LOGS` | `false` (`true` in containers) | JSON output |
//! | `RENTX_NETWORK` | `testnet` | RenVM network label |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging, LoggingGuard};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("Invalid log filter {directive:?}: {reason}")]
    Filter { directive: String, reason: String },

    /// A global subscriber was already installed.
    #[error("Failed to install subscriber: {0}")]
    SubscriberInit(String),
}

/// Initialize logging from a configuration.
///
/// Returns a guard to hold for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    init_logging(&config)
}

/// Create a span carrying session context.
///
/// ```rust,ignore
/// let _span = rentx_telemetry::session_span!("gateway", session_id = %session.id).entered();
/// ```
#[macro_export]
macro_rules! session_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
