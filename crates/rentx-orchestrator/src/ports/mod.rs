//! # Ports Module
//!
//! Inbound caller API and outbound chain adapters.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
