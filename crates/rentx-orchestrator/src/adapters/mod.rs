//! # Adapters Layer
//!
//! In-memory implementations of the chain ports, with controls for driving
//! them from tests.

mod destination_chain;
mod source_chain;

pub use destination_chain::InMemoryDestinationChain;
pub use source_chain::InMemorySourceChain;
