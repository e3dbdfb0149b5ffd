//! Domain layer: states, value objects, errors and invariants.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod states;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use states::*;
