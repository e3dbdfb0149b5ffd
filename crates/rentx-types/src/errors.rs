//! # Error Types
//!
//! Errors recorded on sessions and transactions, plus amount parsing errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a failure recorded on a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Gateway address or burn amount computation failed.
    Initialization,
    /// The deposit subscription failed to start or disagreed with the session.
    Listening,
    /// A persisted deposit could not be restored.
    Restore,
    /// The confirmation monitor failed.
    Confirmation,
    /// RenVM refused the transaction at the protocol level.
    SigningReverted,
    /// RenVM could not be reached or returned a non-final error.
    SigningTransient,
    /// Broadcasting the burn to the source chain failed.
    Submission,
    /// Submitting the mint to the destination chain failed.
    Claim,
    /// Releasing funds for a burn failed.
    Release,
}

impl ErrorKind {
    /// Whether a caller-driven retry can make progress.
    ///
    /// Reverted signatures are final for that deposit.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::SigningReverted)
    }

    /// Stable lowercase name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Listening => "listening",
            Self::Restore => "restore",
            Self::Confirmation => "confirmation",
            Self::SigningReverted => "signing-reverted",
            Self::SigningTransient => "signing",
            Self::Submission => "submission",
            Self::Claim => "claim",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent failure, as stored on a session or transaction.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct SessionError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human readable detail from the adapter.
    pub message: String,
}

impl SessionError {
    /// Create a new session error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors converting decimal amounts into base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Not a non-negative decimal number.
    #[error("Invalid amount: {0:?}")]
    Invalid(String),

    /// More fractional digits than the asset supports.
    #[error("Amount {amount} has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u32 },

    /// Value does not fit into 64 bits of base units.
    #[error("Amount overflow: {0}")]
    Overflow(String),
}
