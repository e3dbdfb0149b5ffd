//! Cross-crate flows.

pub mod burn_flow;
pub mod mint_flow;
pub mod restore;
