//! The per-trip booking draft state machine.
//!
//! One draft exists per expanded trip. Seat taps, point choices, and the
//! proceed action are commands; the outcomes of lock calls and forced
//! availability refreshes feed back in as correction actions. The reducer is
//! pure — every locking and pricing decision is testable as a plain action
//! sequence — and the optimistic-update contract falls out of the split: the
//! state mutates before the effect describing the network call ever runs.
//!
//! Phases: `Empty → Selecting → PointsChosen → PriceComputed`, ending in
//! `Submitted` (checkout handoff, locks deliberately kept) or `Abandoned`
//! (locks released). Both terminal phases are modeled on the draft itself, so
//! a teardown path never needs an out-of-band "skip cleanup" flag.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod store;
#[cfg(test)]
mod tests;
pub mod types;

pub use actions::DraftAction;
pub use environment::DraftEnvironment;
pub use reducer::DraftReducer;
pub use store::{new_draft_store, DraftStore};
pub use types::{DraftNotice, DraftPhase, DraftState};
