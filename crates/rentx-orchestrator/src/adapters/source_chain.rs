//! In-memory source chain.
//!
//! Implements `SourceChain` for tests. Deposits are pushed by hand, and
//! confirmations only move when the test sets them.

use crate::domain::{ChainError, ConfirmationStatus};
use crate::ports::outbound::{BurnProgress, BurnRequest, GatewayRequest, SourceChain};
use async_trait::async_trait;
use parking_lot::RwLock;
use rentx_types::{RawDeposit, TxHash};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

const DEFAULT_DECIMALS: u32 = 8;
const DEFAULT_CONFIRMATION_TARGET: u64 = 6;

/// In-memory source chain for testing.
pub struct InMemorySourceChain {
    name: String,
    decimals: u32,
    confirmation_target: u64,
    state: RwLock<SourceState>,
}

#[derive(Default)]
struct SourceState {
    /// tx hash -> confirmations.
    confirmations: HashMap<TxHash, u64>,
    /// gateway address -> deposits, in arrival order.
    deposits: HashMap<String, Vec<RawDeposit>>,
    /// gateway address -> live watch sinks.
    watchers: HashMap<String, Vec<UnboundedSender<RawDeposit>>>,
    burns: Vec<(TxHash, BurnRequest)>,
    /// Mixed into address derivation; changing it simulates a chain that
    /// derives a different address for the same nonce.
    address_salt: String,
    fail_gateway: bool,
    fail_watch: bool,
    fail_confirmations: bool,
    fail_burns: bool,
}

impl InMemorySourceChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decimals: DEFAULT_DECIMALS,
            confirmation_target: DEFAULT_CONFIRMATION_TARGET,
            state: RwLock::new(SourceState::default()),
        }
    }

    #[must_use]
    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    #[must_use]
    pub fn with_confirmation_target(mut self, target: u64) -> Self {
        self.confirmation_target = target;
        self
    }

    pub fn confirmation_target(&self) -> u64 {
        self.confirmation_target
    }

    /// A deposit payload whose id is `tx_hash`.
    pub fn raw_deposit(tx_hash: &str, amount: u64) -> RawDeposit {
        RawDeposit {
            amount,
            transaction: json!({ "txHash": tx_hash }),
        }
    }

    /// Send a deposit to `address`. Live watchers see it immediately; later
    /// watchers get it on replay.
    pub fn push_deposit(&self, address: &str, raw: RawDeposit) {
        let mut state = self.state.write();
        if let Some(hash) = raw.transaction.get("txHash").and_then(|v| v.as_str()) {
            state.confirmations.entry(hash.to_string()).or_insert(0);
        }
        if let Some(sinks) = state.watchers.get_mut(address) {
            sinks.retain(|sink| sink.send(raw.clone()).is_ok());
        }
        state
            .deposits
            .entry(address.to_string())
            .or_default()
            .push(raw);
    }

    /// Set confirmations. Lower values are stored too, so tests can simulate
    /// a node reporting stale data.
    pub fn set_confirmations(&self, tx_hash: &str, confirmations: u64) {
        self.state
            .write()
            .confirmations
            .insert(tx_hash.to_string(), confirmations);
    }

    /// Bring a transaction to the confirmation target.
    pub fn confirm(&self, tx_hash: &str) {
        self.set_confirmations(tx_hash, self.confirmation_target);
    }

    pub fn confirmations(&self, tx_hash: &str) -> Option<u64> {
        self.state.read().confirmations.get(tx_hash).copied()
    }

    /// Number of burns broadcast.
    pub fn burn_count(&self) -> usize {
        self.state.read().burns.len()
    }

    /// Hashes of broadcast burns, oldest first.
    pub fn burn_hashes(&self) -> Vec<TxHash> {
        self.state.read().burns.iter().map(|(h, _)| h.clone()).collect()
    }

    /// Number of open watch subscriptions for `address`.
    pub fn watcher_count(&self, address: &str) -> usize {
        self.state
            .read()
            .watchers
            .get(address)
            .map(|sinks| sinks.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn set_address_salt(&self, salt: impl Into<String>) {
        self.state.write().address_salt = salt.into();
    }

    pub fn fail_gateway_address(&self, fail: bool) {
        self.state.write().fail_gateway = fail;
    }

    pub fn fail_watch(&self, fail: bool) {
        self.state.write().fail_watch = fail;
    }

    pub fn fail_confirmations(&self, fail: bool) {
        self.state.write().fail_confirmations = fail;
    }

    pub fn fail_burns(&self, fail: bool) {
        self.state.write().fail_burns = fail;
    }
}

fn derive_address(request: &GatewayRequest, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.network.as_str().as_bytes());
    hasher.update(request.asset.as_bytes());
    hasher.update(request.source_chain.as_bytes());
    hasher.update(request.dest_chain.as_bytes());
    hasher.update(request.dest_address.as_bytes());
    hasher.update(request.nonce.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(&hasher.finalize()[..20])
}

fn burn_hash(request: &BurnRequest, index: usize) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(request.session_id.as_bytes());
    hasher.update(request.amount.to_le_bytes());
    hasher.update(index.to_le_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[async_trait]
impl SourceChain for InMemorySourceChain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn asset_decimals(&self, _asset: &str) -> Result<u32, ChainError> {
        Ok(self.decimals)
    }

    async fn gateway_address(&self, request: &GatewayRequest) -> Result<String, ChainError> {
        let state = self.state.read();
        if state.fail_gateway {
            return Err(ChainError::Unavailable("gateway derivation disabled".to_string()));
        }
        Ok(derive_address(request, &state.address_salt))
    }

    fn transaction_id(&self, raw: &RawDeposit) -> Result<TxHash, ChainError> {
        raw.transaction
            .get("txHash")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ChainError::InvalidPayload("missing txHash".to_string()))
    }

    async fn confirmation_status(&self, tx_hash: &str) -> Result<ConfirmationStatus, ChainError> {
        let state = self.state.read();
        if state.fail_confirmations {
            return Err(ChainError::Network("confirmation lookup failed".to_string()));
        }
        let current = state
            .confirmations
            .get(tx_hash)
            .copied()
            .ok_or_else(|| ChainError::NotFound(tx_hash.to_string()))?;
        Ok(ConfirmationStatus {
            current,
            target: self.confirmation_target,
        })
    }

    async fn watch_deposits(
        &self,
        address: &str,
        sink: UnboundedSender<RawDeposit>,
    ) -> Result<(), ChainError> {
        {
            let mut state = self.state.write();
            if state.fail_watch {
                return Err(ChainError::Unavailable("watch disabled".to_string()));
            }
            let known = state.deposits.get(address).cloned().unwrap_or_default();
            debug!(
                "[{}] Watching {} (replaying {} deposits)",
                self.name,
                address,
                known.len()
            );
            for raw in known {
                if sink.send(raw).is_err() {
                    return Ok(());
                }
            }
            state
                .watchers
                .entry(address.to_string())
                .or_default()
                .push(sink.clone());
        }
        sink.closed().await;
        Ok(())
    }

    async fn submit_burn(
        &self,
        request: &BurnRequest,
        progress: UnboundedSender<BurnProgress>,
    ) -> Result<TxHash, ChainError> {
        let tx_hash = {
            let mut state = self.state.write();
            if state.fail_burns {
                return Err(ChainError::Rejected("burn rejected".to_string()));
            }
            let tx_hash = burn_hash(request, state.burns.len());
            state.burns.push((tx_hash.clone(), request.clone()));
            state.confirmations.insert(tx_hash.clone(), 0);
            tx_hash
        };

        info!(
            "[{}] Burned {} for session {}: {}",
            self.name, request.amount, request.session_id, tx_hash
        );

        // The receiver may already be gone; the hash is still returned.
        let _ = progress.send(BurnProgress::Submitted {
            tx_hash: tx_hash.clone(),
        });
        let _ = progress.send(BurnProgress::Confirmation {
            current: 0,
            target: self.confirmation_target,
        });
        Ok(tx_hash)
    }
}
