//! # Domain Errors
//!
//! Adapter failures, API failures and configuration failures.

use rentx_types::{AmountError, ErrorKind, SessionError};
use thiserror::Error;

/// Failure reported by a chain adapter or RenVM.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Transport or node failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Transaction, address or asset unknown to the chain.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload could not be decoded.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The chain refused the transaction.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Adapter is not able to serve the request right now.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl ChainError {
    /// Record this failure on a session under the given category.
    #[must_use]
    pub fn into_session_error(self, kind: ErrorKind) -> SessionError {
        SessionError::new(kind, self.to_string())
    }
}

/// Errors returned to callers of the orchestrator API.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No adapter registered for this chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    /// The orchestrator task has exited.
    #[error("Orchestrator for session {0} has stopped")]
    ActorStopped(String),

    /// The orchestrator task panicked or was aborted.
    #[error("Orchestrator for session {0} panicked")]
    ActorPanicked(String),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid amount.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Invalid orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },

    /// Confirmation polling needs a positive interval.
    #[error("Confirmation poll interval must be positive")]
    ZeroPollInterval,
}
