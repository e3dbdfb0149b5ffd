//! In-memory destination chain with a built-in RenVM.
//!
//! Implements `DestinationChain` for tests. Claims are keyed by source
//! transaction, so a repeated claim returns the first mint's hash without
//! minting again.

use crate::domain::{ChainError, FeeSchedule, ReleaseResponse};
use crate::ports::outbound::{
    ClaimProgress, ClaimRequest, DestinationChain, ReleaseProgress, ReleaseRequest,
    SignatureOutcome, SignatureRequest,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use rentx_types::TxHash;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// In-memory destination chain for testing.
pub struct InMemoryDestinationChain {
    name: String,
    state: RwLock<DestinationState>,
}

struct DestinationState {
    fees: FeeSchedule,
    /// source tx hash -> revert reason.
    reverts: HashMap<TxHash, String>,
    /// source tx hash -> destination tx hash.
    mints: HashMap<TxHash, String>,
    signature_requests: u64,
    claim_attempts: u64,
    releases: u64,
    release_requests: u64,
    failing_signatures: u32,
    failing_claims: u32,
    failing_releases: u32,
    expose_release_tx: bool,
}

impl Default for DestinationState {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            reverts: HashMap::new(),
            mints: HashMap::new(),
            signature_requests: 0,
            claim_attempts: 0,
            releases: 0,
            release_requests: 0,
            failing_signatures: 0,
            failing_claims: 0,
            failing_releases: 0,
            expose_release_tx: true,
        }
    }
}

impl InMemoryDestinationChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(DestinationState::default()),
        }
    }

    #[must_use]
    pub fn with_fees(self, fees: FeeSchedule) -> Self {
        self.state.write().fees = fees;
        self
    }

    /// Releases complete without reporting a destination hash.
    #[must_use]
    pub fn without_release_tx(self) -> Self {
        self.state.write().expose_release_tx = false;
        self
    }

    /// RenVM will revert the deposit `source_tx_hash`.
    pub fn revert(&self, source_tx_hash: &str, reason: impl Into<String>) {
        self.state
            .write()
            .reverts
            .insert(source_tx_hash.to_string(), reason.into());
    }

    /// The next `count` signature requests fail transiently.
    pub fn fail_next_signatures(&self, count: u32) {
        self.state.write().failing_signatures = count;
    }

    /// The next `count` claims fail.
    pub fn fail_next_claims(&self, count: u32) {
        self.state.write().failing_claims = count;
    }

    /// The next `count` releases fail.
    pub fn fail_next_releases(&self, count: u32) {
        self.state.write().failing_releases = count;
    }

    pub fn signature_requests(&self) -> u64 {
        self.state.read().signature_requests
    }

    /// Claims submitted, duplicates and failures included.
    pub fn claim_attempts(&self) -> u64 {
        self.state.read().claim_attempts
    }

    /// Distinct mints on chain.
    pub fn mint_count(&self) -> usize {
        self.state.read().mints.len()
    }

    pub fn minted(&self, source_tx_hash: &str) -> Option<String> {
        self.state.read().mints.get(source_tx_hash).cloned()
    }

    /// Completed releases.
    pub fn release_count(&self) -> u64 {
        self.state.read().releases
    }

    /// Release requests, failures included.
    pub fn release_requests(&self) -> u64 {
        self.state.read().release_requests
    }
}

fn digest_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl DestinationChain for InMemoryDestinationChain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fees(&self, _asset: &str) -> Result<FeeSchedule, ChainError> {
        Ok(self.state.read().fees)
    }

    async fn request_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<SignatureOutcome, ChainError> {
        let mut state = self.state.write();
        state.signature_requests += 1;

        if let Some(reason) = state.reverts.get(&request.source_tx_hash) {
            debug!("[{}] RenVM reverted {}", self.name, request.source_tx_hash);
            return Ok(SignatureOutcome::Reverted {
                reason: reason.clone(),
            });
        }
        if state.failing_signatures > 0 {
            state.failing_signatures -= 1;
            return Err(ChainError::Network("RenVM unreachable".to_string()));
        }

        Ok(SignatureOutcome::Signed {
            ren_vm_hash: format!("renvm-{}", request.source_tx_hash),
            signature: digest_hex(&[
                "sig",
                request.source_tx_hash.as_str(),
                request.nonce.as_str(),
            ]),
            response: json!({
                "txHash": request.source_tx_hash,
                "amount": request.raw.amount,
                "nonce": request.nonce,
                "to": request.dest_address,
            }),
        })
    }

    async fn submit_claim(
        &self,
        request: &ClaimRequest,
        progress: UnboundedSender<ClaimProgress>,
    ) -> Result<String, ChainError> {
        let source_tx_hash = &request.deposit.source_tx_hash;
        let dest_tx_hash = {
            let mut state = self.state.write();
            state.claim_attempts += 1;

            if state.failing_claims > 0 {
                state.failing_claims -= 1;
                return Err(ChainError::Rejected("mint reverted".to_string()));
            }
            if request.deposit.signature.is_none() {
                return Err(ChainError::Rejected(format!(
                    "no signature for {source_tx_hash}"
                )));
            }

            if let Some(existing) = state.mints.get(source_tx_hash).cloned() {
                debug!(
                    "[{}] Duplicate claim for {}, already minted",
                    self.name, source_tx_hash
                );
                existing
            } else {
                let minted = format!(
                    "0x{}",
                    digest_hex(&[
                        request.dest_chain.as_str(),
                        source_tx_hash.as_str(),
                        request.dest_address.as_str(),
                    ])
                );
                state.mints.insert(source_tx_hash.clone(), minted.clone());
                info!("[{}] Minted {} -> {}", self.name, source_tx_hash, minted);
                minted
            }
        };

        let _ = progress.send(ClaimProgress::Submitted {
            dest_tx_hash: dest_tx_hash.clone(),
        });
        let _ = progress.send(ClaimProgress::Confirmed);
        Ok(dest_tx_hash)
    }

    async fn request_release(
        &self,
        request: &ReleaseRequest,
        progress: UnboundedSender<ReleaseProgress>,
    ) -> Result<ReleaseResponse, ChainError> {
        let expose_release_tx = {
            let mut state = self.state.write();
            state.release_requests += 1;
            if state.failing_releases > 0 {
                state.failing_releases -= 1;
                return Err(ChainError::Network("RenVM unreachable".to_string()));
            }
            state.releases += 1;
            state.expose_release_tx
        };

        let ren_vm_hash = format!("renvm-{}", request.source_tx_hash);
        let _ = progress.send(ReleaseProgress::Accepted {
            ren_vm_hash: ren_vm_hash.clone(),
        });

        let dest_tx_hash = expose_release_tx
            .then(|| digest_hex(&[
                "release",
                request.source_tx_hash.as_str(),
                request.dest_address.as_str(),
            ]));
        if let Some(hash) = &dest_tx_hash {
            let _ = progress.send(ReleaseProgress::Transaction {
                dest_tx_hash: hash.clone(),
            });
        }

        info!(
            "[{}] Released {} to {}",
            self.name, request.amount, request.dest_address
        );
        Ok(ReleaseResponse {
            ren_vm_hash: Some(ren_vm_hash),
            dest_tx_hash,
            response: json!({
                "amount": request.amount,
                "to": request.dest_address,
            }),
        })
    }
}
