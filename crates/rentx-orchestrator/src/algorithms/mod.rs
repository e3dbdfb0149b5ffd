//! # Algorithms Module
//!
//! Gateway and burn creation: nonce generation, address derivation and amount
//! computation.

pub mod creation;

pub use creation::{
    create_burn, create_gateway, derive_gateway_address, generate_nonce, verify_gateway_address,
};
