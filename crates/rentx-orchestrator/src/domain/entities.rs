//! # Domain Entities
//!
//! Values exchanged between orchestrators and adapters.

use rentx_types::AmountError;
use serde::{Deserialize, Serialize};

/// Confirmation count of a source-chain transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationStatus {
    /// Confirmations observed so far.
    pub current: u64,
    /// Confirmations RenVM requires.
    pub target: u64,
}

impl ConfirmationStatus {
    /// Target reached.
    pub fn is_final(&self) -> bool {
        self.current >= self.target
    }
}

/// RenVM's answer to a successful signature request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenSignature {
    /// RenVM transaction id.
    pub ren_vm_hash: String,
    /// Signature redeemed on the destination chain.
    pub signature: String,
    /// Full RenVM response, kept for the claim.
    pub response: serde_json::Value,
}

/// RenVM's answer to a completed release.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub ren_vm_hash: Option<String>,
    /// Absent for chains that do not expose one synchronously.
    pub dest_tx_hash: Option<String>,
    pub response: serde_json::Value,
}

/// Output of gateway creation, merged into the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayCreation {
    pub nonce: String,
    pub gateway_address: String,
    pub suggested_amount: Option<u64>,
}

/// Protocol fees, in base units and basis points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fixed fee charged on mint.
    pub lock: u64,
    /// Fixed fee charged on release.
    pub release: u64,
    /// Proportional mint fee.
    pub mint_bps: u16,
    /// Proportional burn fee.
    pub burn_bps: u16,
}

impl FeeSchedule {
    /// Amount to send so that `amount` arrives after mint fees.
    pub fn apply_mint(&self, amount: u64) -> Result<u64, AmountError> {
        add_fees(amount, self.lock, self.mint_bps)
    }

    /// Amount to burn so that `amount` is released after burn fees.
    pub fn apply_burn(&self, amount: u64) -> Result<u64, AmountError> {
        add_fees(amount, self.release, self.burn_bps)
    }
}

fn add_fees(amount: u64, fixed: u64, bps: u16) -> Result<u64, AmountError> {
    let amount_wide = u128::from(amount);
    let proportional = (amount_wide * u128::from(bps)).div_ceil(10_000);
    let total = amount_wide + u128::from(fixed) + proportional;
    u64::try_from(total).map_err(|_| AmountError::Overflow(total.to_string()))
}
