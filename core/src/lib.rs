//! # Seathold Core
//!
//! Core traits and types for the seathold seat-reservation architecture.
//!
//! Seat selection is a long-lived interactive flow with real interleaving
//! concerns: optimistic lock calls in flight while the shopper keeps tapping,
//! availability refreshes racing the shopper's own actions, cleanup that must
//! fire on every exit path. This crate provides the abstractions that keep
//! that logic testable without a rendering layer or a live backend:
//!
//! - **State**: owned domain state for one feature (a booking draft, a cache)
//! - **Action**: every possible input to a reducer — shopper commands and the
//!   feedback produced by resolved network calls
//! - **Reducer**: pure function `(State, Action, Environment) → Effects`
//! - **Effect**: a *description* of a side effect, executed by the runtime
//! - **Environment**: injected dependencies behind traits (clock, backend)
//!
//! The runtime crate executes effects and feeds any action they produce back
//! into the reducer, which is how an optimistic mutation gets corrected when
//! the backend answers.
//!
//! ## Example
//!
//! ```ignore
//! use seathold_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for DraftReducer {
//!     type State = DraftState;
//!     type Action = DraftAction;
//!     type Environment = DraftEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut DraftState,
//!         action: DraftAction,
//!         env: &DraftEnvironment,
//!     ) -> SmallVec<[Effect<DraftAction>; 4]> {
//!         match action {
//!             DraftAction::SeatTapped { seat } => {
//!                 state.select(seat.clone());
//!                 smallvec![Effect::Future(Box::pin(async move {
//!                     // call the backend, feed the outcome back
//!                     Some(DraftAction::LockResolved { seat, outcome })
//!                 }))]
//!             }
//!             _ => SmallVec::new(),
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types so domain crates pull one dependency
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the core trait for seat-flow business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Effects`.
/// All locking, pricing, and cleanup decisions live in reducers so they can
/// be driven in tests by plain action sequences.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: the domain state this reducer operates on
    /// - `Action`: the action type this reducer processes
    /// - `Environment`: the injected dependencies this reducer needs
    ///
    /// A reducer must not perform I/O; it validates the action, updates the
    /// state in place, and returns effect descriptions for the runtime to
    /// execute. The optimistic-update contract depends on this split: the
    /// state mutation is visible to the caller the moment `reduce` returns,
    /// while the network call it described is still in flight.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: mutable reference to current state
        /// - `action`: the action to process
        /// - `env`: reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effect descriptions to be executed by the runtime. Most actions
        /// produce zero or one effect; four are inlined before spilling.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values, not execution. A reducer that wants a lock call
/// returns `Effect::Future` describing it; the Store runtime spawns the
/// future and feeds the produced action (if any) back into the reducer.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future an effect executes, resolving to an optional feedback
    /// action.
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the Store
    /// runtime.
    ///
    /// There is deliberately no timer variant: the seat flow enforces no
    /// client-side deadlines beyond the availability TTL, and stale network
    /// responses are ignored by construction rather than cancelled.
    #[allow(missing_docs)]
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects in order, each one finishing before the next starts
        /// (e.g. release a seat, then force-refresh availability so the
        /// shopper sees their own action reflected)
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if `Some`, the action is fed back into
        /// the reducer
        Future(EffectFuture<Action>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run concurrently
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing at all
        #[must_use]
        pub fn is_noop(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_noop)
                },
                Effect::Future(_) => false,
            }
        }
    }
}

/// Environment module - dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected via
/// the Environment parameter. Time in particular is never read ambiently:
/// TTL and backoff arithmetic go through [`environment::Clock`] so they are
/// deterministic under test.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Production uses [`SystemClock`]; tests inject a fixed or stepping
    /// clock from the testing crate.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[derive(Clone, Debug)]
    enum TestAction {
        Ping,
    }

    #[test]
    fn noop_detection_sees_through_nesting() {
        let effect: Effect<TestAction> =
            Effect::chain(vec![Effect::None, Effect::merge(vec![Effect::None])]);
        assert!(effect.is_noop());

        let effect: Effect<TestAction> = Effect::merge(vec![
            Effect::None,
            Effect::Future(Box::pin(async { Some(TestAction::Ping) })),
        ]);
        assert!(!effect.is_noop());
    }

    #[test]
    fn debug_formatting_is_stable() {
        let effect: Effect<TestAction> = Effect::Future(Box::pin(async { None }));
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }
}
