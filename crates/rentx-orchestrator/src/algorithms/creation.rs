//! # Gateway and Burn Creation
//!
//! The only side-effecting step of a mint before listening, and of a burn
//! before submission. Both are idempotent: a session that already has a nonce
//! derives the same address again.

use crate::domain::{ChainError, GatewayCreation};
use crate::ports::{DestinationChain, GatewayRequest, SourceChain};
use rand::RngCore;
use rentx_types::{to_base_units, BurnSession, ErrorKind, GatewaySession, SessionError};

/// Generate a random 32-byte nonce, hex encoded.
pub fn generate_nonce() -> String {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    hex::encode(nonce)
}

/// Derive the gateway address for `session` under `nonce`.
pub async fn derive_gateway_address(
    session: &GatewaySession,
    nonce: &str,
    source: &dyn SourceChain,
) -> Result<String, ChainError> {
    let request = GatewayRequest::for_session(session, nonce);
    source.gateway_address(&request).await
}

/// Compute nonce, gateway address and suggested amount for a new session.
///
/// An existing nonce is reused, never regenerated.
pub async fn create_gateway(
    session: &GatewaySession,
    source: &dyn SourceChain,
    dest: &dyn DestinationChain,
    auto_fees: bool,
) -> Result<GatewayCreation, SessionError> {
    let kind = ErrorKind::Initialization;
    let nonce = session.nonce.clone().unwrap_or_else(generate_nonce);

    let gateway_address = derive_gateway_address(session, &nonce, source)
        .await
        .map_err(|e| e.into_session_error(kind))?;

    let asset = &session.params.source_asset;
    let decimals = source
        .asset_decimals(asset)
        .await
        .map_err(|e| e.into_session_error(kind))?;
    let mut amount = to_base_units(&session.params.target_amount, decimals)
        .map_err(|e| SessionError::new(kind, e.to_string()))?;
    if auto_fees {
        let fees = dest.fees(asset).await.map_err(|e| e.into_session_error(kind))?;
        amount = fees
            .apply_mint(amount)
            .map_err(|e| SessionError::new(kind, e.to_string()))?;
    }

    Ok(GatewayCreation {
        nonce,
        gateway_address,
        suggested_amount: Some(amount),
    })
}

/// Re-derive the address of a session that already has one and check that
/// the adapter still agrees.
pub async fn verify_gateway_address(
    session: &GatewaySession,
    source: &dyn SourceChain,
) -> Result<String, SessionError> {
    let kind = ErrorKind::Listening;
    let (Some(nonce), Some(expected)) = (&session.nonce, &session.gateway_address) else {
        return Err(SessionError::new(kind, "session has no gateway address"));
    };
    let derived = derive_gateway_address(session, nonce, source)
        .await
        .map_err(|e| e.into_session_error(kind))?;
    if &derived != expected {
        return Err(SessionError::new(
            kind,
            format!("gateway address mismatch: expected {expected}, derived {derived}"),
        ));
    }
    Ok(derived)
}

/// Compute the amount to burn, fees included when `auto_fees` is set.
pub async fn create_burn(
    session: &BurnSession,
    source: &dyn SourceChain,
    dest: &dyn DestinationChain,
    auto_fees: bool,
) -> Result<u64, SessionError> {
    let kind = ErrorKind::Initialization;
    let asset = &session.params.source_asset;
    let decimals = source
        .asset_decimals(asset)
        .await
        .map_err(|e| e.into_session_error(kind))?;
    let amount = to_base_units(&session.params.target_amount, decimals)
        .map_err(|e| SessionError::new(kind, e.to_string()))?;
    if !auto_fees {
        return Ok(amount);
    }
    let fees = dest.fees(asset).await.map_err(|e| e.into_session_error(kind))?;
    fees.apply_burn(amount)
        .map_err(|e| SessionError::new(kind, e.to_string()))
}
