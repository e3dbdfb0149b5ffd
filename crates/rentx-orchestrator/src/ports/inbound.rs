//! # Inbound Ports
//!
//! What a caller can ask of a running session. Commands are queued on the
//! orchestrator's mailbox and take effect in arrival order; an `Err` only
//! means the orchestrator has already exited.

use crate::domain::OrchestratorError;
use rentx_types::{CustomParams, TxHash};

/// Commands accepted by a gateway orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayCommand {
    /// Submit the mint for a claimable deposit.
    Claim {
        source_tx_hash: TxHash,
        params: CustomParams,
    },
    /// Mark a submitted deposit as done.
    Acknowledge { source_tx_hash: TxHash },
    /// Give up on a claimable deposit.
    Reject { source_tx_hash: TxHash },
    /// Retry a deposit parked in an error state.
    RetryDeposit { source_tx_hash: TxHash },
    /// Retry gateway creation or listening.
    Retry,
    Stop,
}

/// Commands accepted by a burn orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BurnCommand {
    Submit,
    Retry,
    Stop,
}

/// Mint session API - inbound port.
pub trait MintSessionApi: Send + Sync {
    fn session_id(&self) -> &str;

    fn claim(&self, source_tx_hash: &str, params: CustomParams) -> Result<(), OrchestratorError>;

    fn acknowledge(&self, source_tx_hash: &str) -> Result<(), OrchestratorError>;

    fn reject(&self, source_tx_hash: &str) -> Result<(), OrchestratorError>;

    fn retry_deposit(&self, source_tx_hash: &str) -> Result<(), OrchestratorError>;

    fn retry(&self) -> Result<(), OrchestratorError>;

    /// Cancel the listener and every deposit.
    fn stop(&self) -> Result<(), OrchestratorError>;
}

/// Burn session API - inbound port.
pub trait BurnSessionApi: Send + Sync {
    fn session_id(&self) -> &str;

    /// Broadcast the burn. Ignored once a burn exists.
    fn submit(&self) -> Result<(), OrchestratorError>;

    fn retry(&self) -> Result<(), OrchestratorError>;

    fn stop(&self) -> Result<(), OrchestratorError>;
}
