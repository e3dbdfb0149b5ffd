//! # Outbound Ports
//!
//! Chain adapters injected into the orchestrators. A mint uses the source
//! chain to derive the gateway address and watch deposits, and the
//! destination chain (with RenVM behind it) to sign and claim. A burn uses the
//! source chain to burn and the destination chain to release.
//!
//! Long-running calls report progress through an unbounded sender and return
//! their final result; the caller keeps the receiver.

use crate::domain::{ChainError, ConfirmationStatus, FeeSchedule, ReleaseResponse};
use async_trait::async_trait;
use rentx_types::{
    BurnSession, CustomParams, GatewaySession, GatewayTransaction, RawDeposit, RenNetwork, TxHash,
};
use tokio::sync::mpsc::UnboundedSender;

// =============================================================================
// REQUESTS
// =============================================================================

/// Inputs for gateway address derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayRequest {
    pub network: RenNetwork,
    pub asset: String,
    pub source_chain: String,
    pub dest_chain: String,
    pub dest_address: String,
    pub nonce: String,
    pub custom_params: CustomParams,
}

impl GatewayRequest {
    /// Request for `session` with the given nonce.
    pub fn for_session(session: &GatewaySession, nonce: &str) -> Self {
        Self {
            network: session.params.network,
            asset: session.params.source_asset.clone(),
            source_chain: session.params.source_chain.clone(),
            dest_chain: session.params.dest_chain.clone(),
            dest_address: session.params.dest_address.clone(),
            nonce: nonce.to_string(),
            custom_params: session.custom_params.clone(),
        }
    }
}

/// Signature request for one deposit.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureRequest {
    pub session_id: String,
    pub asset: String,
    pub nonce: String,
    pub dest_address: String,
    pub source_tx_hash: TxHash,
    pub raw: RawDeposit,
}

/// Mint submission for one signed deposit.
#[derive(Clone, Debug, PartialEq)]
pub struct ClaimRequest {
    pub session_id: String,
    pub dest_chain: String,
    pub dest_address: String,
    pub deposit: GatewayTransaction,
    /// Caller-supplied contract parameters.
    pub contract_params: CustomParams,
}

/// Burn on the source chain.
#[derive(Clone, Debug, PartialEq)]
pub struct BurnRequest {
    pub session_id: String,
    pub network: RenNetwork,
    pub asset: String,
    pub dest_address: String,
    pub amount: u64,
    pub custom_params: CustomParams,
}

impl BurnRequest {
    pub fn for_session(session: &BurnSession, amount: u64) -> Self {
        Self {
            session_id: session.id.clone(),
            network: session.params.network,
            asset: session.params.source_asset.clone(),
            dest_address: session.params.dest_address.clone(),
            amount,
            custom_params: session.custom_params.clone(),
        }
    }
}

/// Release of a confirmed burn.
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseRequest {
    pub session_id: String,
    pub network: RenNetwork,
    pub asset: String,
    pub dest_address: String,
    pub source_tx_hash: TxHash,
    pub amount: u64,
    pub custom_params: CustomParams,
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BurnProgress {
    /// Broadcast; the hash is final.
    Submitted { tx_hash: TxHash },
    Confirmation { current: u64, target: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimProgress {
    Submitted { dest_tx_hash: String },
    /// Mint confirmed on the destination chain.
    Confirmed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseProgress {
    Accepted { ren_vm_hash: String },
    Transaction { dest_tx_hash: String },
}

/// Outcome of a signature request that reached RenVM.
#[derive(Clone, Debug, PartialEq)]
pub enum SignatureOutcome {
    Signed {
        ren_vm_hash: String,
        signature: String,
        response: serde_json::Value,
    },
    /// Refused at the protocol level. Not retried.
    Reverted { reason: String },
}

// =============================================================================
// PORTS
// =============================================================================

/// Chain holding the asset before a mint, and the wrapped asset before a burn.
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Decimals of `asset` on this chain.
    async fn asset_decimals(&self, asset: &str) -> Result<u32, ChainError>;

    /// Derive the gateway address. Same request, same address.
    async fn gateway_address(&self, request: &GatewayRequest) -> Result<String, ChainError>;

    /// Stable identifier of a deposit. Must be deterministic.
    fn transaction_id(&self, raw: &RawDeposit) -> Result<TxHash, ChainError>;

    async fn confirmation_status(&self, tx_hash: &str) -> Result<ConfirmationStatus, ChainError>;

    /// Stream every deposit to `address`, past and future, into `sink`.
    ///
    /// Returns when the sink is closed. An `Err` means the watch could not
    /// start or was lost.
    async fn watch_deposits(
        &self,
        address: &str,
        sink: UnboundedSender<RawDeposit>,
    ) -> Result<(), ChainError>;

    /// Broadcast a burn and return its hash.
    async fn submit_burn(
        &self,
        request: &BurnRequest,
        progress: UnboundedSender<BurnProgress>,
    ) -> Result<TxHash, ChainError>;
}

/// Chain receiving the minted asset, or the released asset after a burn.
#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Current protocol fees for `asset`.
    async fn fees(&self, _asset: &str) -> Result<FeeSchedule, ChainError> {
        Ok(FeeSchedule::default())
    }

    async fn request_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<SignatureOutcome, ChainError>;

    /// Submit the mint and return the destination transaction hash.
    ///
    /// A repeated claim for the same deposit must return the original hash
    /// without minting again.
    async fn submit_claim(
        &self,
        request: &ClaimRequest,
        progress: UnboundedSender<ClaimProgress>,
    ) -> Result<String, ChainError>;

    async fn request_release(
        &self,
        request: &ReleaseRequest,
        progress: UnboundedSender<ReleaseProgress>,
    ) -> Result<ReleaseResponse, ChainError>;
}
