//! # Orchestrator States
//!
//! Closed state sets for the gateway, deposit and burn orchestrators.
//! Names serialize in the camelCase form used in emitted events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway (mint session) state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GatewayState {
    /// Inspecting the loaded session.
    #[default]
    Restoring,
    /// Deriving nonce and gateway address.
    Creating,
    /// Watching the gateway address and driving deposits.
    Listening,
    /// Creation or listening failed. Retriable.
    SrcInitializeError,
    /// Expired.
    Completed,
}

impl GatewayState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: GatewayState) -> bool {
        use GatewayState::*;
        match (self, next) {
            (Restoring, Creating | Listening | Completed) => true,
            (Creating, Listening | SrcInitializeError | Completed) => true,
            (Listening, SrcInitializeError | Completed) => true,
            (SrcInitializeError, Creating | Listening | Completed) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Event-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restoring => "restoring",
            Self::Creating => "creating",
            Self::Listening => "listening",
            Self::SrcInitializeError => "srcInitializeError",
            Self::Completed => "completed",
        }
    }
}

/// Deposit state, one machine per detected deposit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DepositState {
    /// Skipping deposits finished in an earlier run.
    #[default]
    CheckingCompletion,
    /// Asking the listener to re-attach the deposit.
    RestoringDeposit,
    /// Restore failed.
    ErrorRestoring,
    /// Restored; resolved immediately to the most advanced matching state.
    RestoredDeposit,
    /// Waiting for source confirmations.
    SrcSettling,
    /// Confirmed; signature requested.
    SrcConfirmed,
    /// Signing failed transiently.
    ErrorAccepting,
    /// Signed; waiting for a claim.
    Accepted,
    /// Claim submission outstanding.
    Claiming,
    /// Claim submission failed; another claim is accepted.
    ErrorSubmitting,
    /// Claim broadcast; waiting for acknowledgement.
    DestInitiated,
    /// Acknowledged.
    Completed,
    /// Rejected by the caller.
    Rejected,
    /// Refused by RenVM. Never retried.
    Reverted,
}

impl DepositState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: DepositState) -> bool {
        use DepositState::*;
        match (self, next) {
            (CheckingCompletion, Completed | RestoringDeposit) => true,
            (RestoringDeposit, RestoredDeposit | ErrorRestoring) => true,
            (ErrorRestoring, RestoringDeposit) => true,
            (RestoredDeposit, SrcSettling | SrcConfirmed | Accepted | DestInitiated) => true,
            (SrcSettling, SrcConfirmed) => true,
            (SrcConfirmed, Accepted | ErrorAccepting | Reverted) => true,
            (ErrorAccepting, SrcConfirmed) => true,
            (Accepted, Claiming | Rejected) => true,
            (Claiming, DestInitiated | ErrorSubmitting) => true,
            (ErrorSubmitting, Claiming | Rejected) => true,
            (DestInitiated, Completed) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Reverted)
    }

    /// States that record an error on the deposit.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ErrorRestoring | Self::ErrorAccepting | Self::ErrorSubmitting | Self::Reverted
        )
    }

    /// Event-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckingCompletion => "checkingCompletion",
            Self::RestoringDeposit => "restoringDeposit",
            Self::ErrorRestoring => "errorRestoring",
            Self::RestoredDeposit => "restoredDeposit",
            Self::SrcSettling => "srcSettling",
            Self::SrcConfirmed => "srcConfirmed",
            Self::ErrorAccepting => "errorAccepting",
            Self::Accepted => "accepted",
            Self::Claiming => "claiming",
            Self::ErrorSubmitting => "errorSubmitting",
            Self::DestInitiated => "destInitiated",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Reverted => "reverted",
        }
    }
}

/// Burn session state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BurnState {
    /// Inspecting the loaded session.
    #[default]
    Restoring,
    /// Computing the amount to burn.
    Creating,
    /// Amount known; waiting to submit.
    Created,
    /// Amount computation failed.
    CreateError,
    /// Burn broadcast; waiting for confirmations.
    SrcSettling,
    /// Submission or monitoring failed.
    ErrorBurning,
    /// Confirmed; release requested.
    SrcConfirmed,
    /// Release failed.
    ErrorReleasing,
    /// Released.
    DestInitiated,
}

impl BurnState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: BurnState) -> bool {
        use BurnState::*;
        match (self, next) {
            (Restoring, DestInitiated | SrcConfirmed | SrcSettling | Creating) => true,
            (Creating, Created | CreateError) => true,
            (CreateError, Creating) => true,
            (Created, SrcSettling | ErrorBurning) => true,
            (ErrorBurning, Created | SrcSettling) => true,
            (SrcSettling, SrcConfirmed | ErrorBurning) => true,
            (SrcConfirmed, DestInitiated | ErrorReleasing) => true,
            (ErrorReleasing, SrcConfirmed) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DestInitiated)
    }

    /// Event-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restoring => "restoring",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::CreateError => "createError",
            Self::SrcSettling => "srcSettling",
            Self::ErrorBurning => "errorBurning",
            Self::SrcConfirmed => "srcConfirmed",
            Self::ErrorReleasing => "errorReleasing",
            Self::DestInitiated => "destInitiated",
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DepositState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
