//! # RenTX Orchestrator
//!
//! Orchestration of RenVM mint and burn sessions.
//!
//! **Architecture:** Hexagonal (machines + actors + ports/adapters)
//!
//! ## Purpose
//!
//! Move an asset from a source chain to a destination chain through RenVM:
//! - **Mint**: derive a gateway address, watch it for deposits, wait for
//!   confirmations, get a RenVM signature, submit the claim
//! - **Burn**: burn on the source chain, wait for confirmations, ask RenVM to
//!   release on the destination chain
//!
//! ## Sessions
//!
//! | Session | Orchestrator | Children |
//! |---------|--------------|----------|
//! | `GatewaySession` | `GatewayOrchestrator` | listener, one deposit actor per transaction |
//! | `BurnSession` | `BurnOrchestrator` | none |
//!
//! Every transition publishes a `SessionEvent` with a full snapshot. A
//! snapshot fed back into an orchestrator resumes where it left off, without
//! regenerating the nonce, re-burning, or minting a deposit twice.
//!
//! ## Module Structure
//!
//! ```text
//! rentx-orchestrator/
//! ├── domain/          # States, value objects, errors, invariants
//! ├── machines/        # Pure gateway, deposit and burn transitions
//! ├── actors/          # Tokio tasks running the machines
//! ├── algorithms/      # Nonce, gateway address and amount computation
//! ├── ports/           # Caller API, SourceChain, DestinationChain
//! ├── adapters/        # In-memory chains
//! ├── registry         # Chain adapters by name
//! └── config           # Environment configuration
//! ```

#![warn(clippy::all)]

pub mod actors;
pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod machines;
pub mod ports;
pub mod registry;

// Re-exports
pub use actors::{
    BurnHandle, BurnOrchestrator, BurnOutcome, GatewayHandle, GatewayOrchestrator, GatewayOutcome,
};
pub use adapters::{InMemoryDestinationChain, InMemorySourceChain};
pub use algorithms::{create_burn, create_gateway, generate_nonce, verify_gateway_address};
pub use config::{OrchestratorConfig, DEFAULT_CONFIRMATION_POLL_INTERVAL};
pub use domain::{
    BurnState, ChainError, ConfigError, ConfirmationStatus, DepositState, FeeSchedule,
    GatewayCreation, GatewayState, OrchestratorError, ReleaseResponse, RenSignature,
};
pub use ports::{
    BurnCommand, BurnProgress, BurnRequest, BurnSessionApi, ClaimProgress, ClaimRequest,
    DestinationChain, GatewayCommand, GatewayRequest, MintSessionApi, ReleaseProgress,
    ReleaseRequest, SignatureOutcome, SignatureRequest, SourceChain,
};
pub use registry::ChainRegistry;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
