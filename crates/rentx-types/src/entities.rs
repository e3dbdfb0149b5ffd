//! # Session Entities
//!
//! `GatewaySession` (mint) and `BurnSession` (burn) with their transaction
//! records. Field names serialize in camelCase so persisted snapshots read the
//! same across implementations.

use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Source-chain transaction hash, the key of a deposit.
pub type TxHash = String;

/// Free-form parameters passed through to adapters and contracts.
pub type CustomParams = serde_json::Map<String, serde_json::Value>;

/// RenVM network a session runs against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenNetwork {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Development network.
    Devnet,
    /// Local darknodes.
    Localnet,
}

impl RenNetwork {
    /// Network name as used by adapters.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        }
    }
}

/// Parameters common to mint and burn sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    pub network: RenNetwork,
    pub source_asset: String,
    pub source_chain: String,
    pub dest_chain: String,
    pub dest_address: String,
    pub user_address: String,
    /// Decimal amount in whole asset units, e.g. `"0.001"`.
    pub target_amount: String,
}

/// Opaque deposit payload produced by a source-chain adapter.
///
/// Kept on the transaction so a restored deposit can be re-submitted to RenVM
/// without querying the chain again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeposit {
    /// Amount in base units.
    pub amount: u64,
    /// Adapter-specific transaction data.
    pub transaction: serde_json::Value,
}

/// One on-chain deposit to a gateway address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayTransaction {
    pub source_tx_hash: TxHash,
    pub source_tx_amount: u64,
    pub source_tx_confs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tx_conf_target: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_source_tx: Option<RawDeposit>,
    #[serde(rename = "renVMHash", default, skip_serializing_if = "Option::is_none")]
    pub ren_vm_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ren_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_params: Option<CustomParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_tx_hash: Option<String>,
    pub detected_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl GatewayTransaction {
    /// A freshly detected deposit with no progress.
    pub fn detected(source_tx_hash: impl Into<TxHash>, raw: RawDeposit, detected_at: u64) -> Self {
        Self {
            source_tx_hash: source_tx_hash.into(),
            source_tx_amount: raw.amount,
            source_tx_confs: 0,
            source_tx_conf_target: None,
            raw_source_tx: Some(raw),
            ren_vm_hash: None,
            ren_response: None,
            signature: None,
            contract_params: None,
            dest_tx_hash: None,
            detected_at,
            completed_at: None,
            error: None,
        }
    }

    /// RenVM has produced a signature for this deposit.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Confirmations have reached a known target.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.source_tx_conf_target
            .is_some_and(|target| self.source_tx_confs >= target)
    }

    /// The deposit was acknowledged in an earlier run.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A mint session: one gateway address, any number of deposits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySession {
    pub id: String,
    #[serde(flatten)]
    pub params: TransferParams,
    /// Generated once, never regenerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Derived once from the nonce, immutable thereafter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,
    /// Base units the user should send, fees included when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_amount: Option<u64>,
    /// Milliseconds since the Unix epoch.
    pub expiry_time: u64,
    #[serde(default)]
    pub custom_params: CustomParams,
    #[serde(default)]
    pub transactions: BTreeMap<TxHash, GatewayTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl GatewaySession {
    /// Create a session with a random id.
    pub fn new(params: TransferParams, expiry_time: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            params,
            nonce: None,
            gateway_address: None,
            suggested_amount: None,
            expiry_time,
            custom_params: CustomParams::new(),
            transactions: BTreeMap::new(),
            error: None,
        }
    }

    /// Use a caller-chosen id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Use a caller-chosen nonce instead of a generated one.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Attach custom parameters.
    #[must_use]
    pub fn with_custom_params(mut self, custom_params: CustomParams) -> Self {
        self.custom_params = custom_params;
        self
    }

    /// The session can no longer accept deposits.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expiry_time
    }

    /// Milliseconds left before expiry.
    #[must_use]
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expiry_time.saturating_sub(now_ms)
    }
}

/// The single transaction of a burn session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnTransaction {
    pub source_tx_hash: TxHash,
    pub source_tx_amount: u64,
    pub source_tx_confs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tx_conf_target: Option<u64>,
    #[serde(rename = "renVMHash", default, skip_serializing_if = "Option::is_none")]
    pub ren_vm_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ren_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_tx_hash: Option<String>,
    pub detected_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl BurnTransaction {
    /// A burn that was just broadcast.
    pub fn submitted(source_tx_hash: impl Into<TxHash>, amount: u64, detected_at: u64) -> Self {
        Self {
            source_tx_hash: source_tx_hash.into(),
            source_tx_amount: amount,
            source_tx_confs: 0,
            source_tx_conf_target: None,
            ren_vm_hash: None,
            ren_response: None,
            dest_tx_hash: None,
            detected_at,
            completed_at: None,
            error: None,
        }
    }

    /// RenVM has released the funds.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.ren_response.is_some()
    }

    /// Confirmations have reached a known target.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.source_tx_conf_target
            .is_some_and(|target| self.source_tx_confs >= target)
    }
}

/// A burn session: exactly zero or one transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnSession {
    pub id: String,
    #[serde(flatten)]
    pub params: TransferParams,
    /// Base units to burn, fees included when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_amount: Option<u64>,
    #[serde(default)]
    pub custom_params: CustomParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<BurnTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl BurnSession {
    /// Create a session with a random id.
    pub fn new(params: TransferParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            params,
            suggested_amount: None,
            custom_params: CustomParams::new(),
            transaction: None,
            error: None,
        }
    }

    /// Use a caller-chosen id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach custom parameters.
    #[must_use]
    pub fn with_custom_params(mut self, custom_params: CustomParams) -> Self {
        self.custom_params = custom_params;
        self
    }
}
