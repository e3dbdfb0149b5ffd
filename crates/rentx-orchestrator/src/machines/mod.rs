//! # State Machines
//!
//! Pure transition functions `(State, Event, Context) -> (State, Context, [Effect])`.
//! Effects are data; the actors in [`crate::actors`] execute them. Nothing in
//! this module performs I/O or reads the clock.

pub mod burn;
pub mod deposit;
pub mod gateway;

/// Result of feeding one event to a machine.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S, C, E> {
    pub state: S,
    pub context: C,
    pub effects: Vec<E>,
}

impl<S, C, E> Transition<S, C, E> {
    /// Move to `state` and run `effects`.
    pub fn new(state: S, context: C, effects: Vec<E>) -> Self {
        Self {
            state,
            context,
            effects,
        }
    }

    /// Event not handled in this state.
    pub fn unchanged(state: S, context: C) -> Self {
        Self::new(state, context, Vec::new())
    }
}
