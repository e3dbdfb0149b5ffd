//! # Domain Invariants
//!
//! Rules every orchestrator applies when it mutates a record.

use rentx_types::{GatewaySession, GatewayTransaction};

/// Invariant: confirmations never decrease.
///
/// Raises `confs` to `current` if larger and fills `conf_target` if it is
/// still unknown. Returns whether anything changed; stale or reordered updates
/// return `false`.
pub fn apply_confirmations(
    confs: &mut u64,
    conf_target: &mut Option<u64>,
    current: u64,
    target: Option<u64>,
) -> bool {
    let mut changed = false;
    if current > *confs {
        *confs = current;
        changed = true;
    }
    if conf_target.is_none() {
        if let Some(target) = target {
            *conf_target = Some(target);
            changed = true;
        }
    }
    changed
}

/// Invariant: write-once fields keep their first value.
///
/// Returns whether the slot was filled by this call.
pub fn set_once<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

/// Invariant: a destination transaction exists only after a signature.
pub fn invariant_dest_after_signature(tx: &GatewayTransaction) -> bool {
    tx.dest_tx_hash.is_none() || tx.is_signed()
}

/// Invariant: `completedAt` implies `destTxHash`.
pub fn invariant_completed_has_dest(tx: &GatewayTransaction) -> bool {
    tx.completed_at.is_none() || tx.dest_tx_hash.is_some()
}

/// Invariant: once set, the gateway address and nonce never change.
pub fn invariant_gateway_stable(before: &GatewaySession, after: &GatewaySession) -> bool {
    let address_stable =
        before.gateway_address.is_none() || before.gateway_address == after.gateway_address;
    let nonce_stable = before.nonce.is_none() || before.nonce == after.nonce;
    address_stable && nonce_stable
}
