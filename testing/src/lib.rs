//! # Seathold Testing
//!
//! Testing utilities and helpers for the seathold architecture.
//!
//! This crate provides:
//! - Mock clocks (fixed and stepping) for TTL and backoff tests
//! - A fluent Given-When-Then harness for reducer tests
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use seathold_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(DraftReducer::new())
//!     .with_env(test_environment())
//!     .given_state(DraftState::new(trip))
//!     .when_action(DraftAction::SeatTapped { seat: seat("12") })
//!     .then_state(|state| assert_eq!(state.selected_seats().len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use seathold_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use seathold_testing::mocks::FixedClock;
    /// use seathold_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Stepping clock for cache-expiry and backoff-window tests
    ///
    /// Starts at a fixed instant and only moves when the test calls
    /// [`SteppingClock::advance`]. Cloning shares the underlying time, so
    /// the clone handed to a store advances together with the test's copy.
    #[derive(Debug, Clone)]
    pub struct SteppingClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl SteppingClock {
        /// Create a stepping clock starting at the given time
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(start)),
            }
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned (a test thread panicked
        /// while advancing).
        #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable in tests
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for SteppingClock {
        #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable in tests
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Create a stepping clock starting at the default test instant
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should never
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn stepping_clock() -> SteppingClock {
        SteppingClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a compact tracing subscriber for a test binary
///
/// Respects `RUST_LOG`; defaults to `warn`. Safe to call from multiple
/// tests — only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{stepping_clock, test_clock, FixedClock, SteppingClock};
pub use reducer_test::{assertions, ReducerTest};

#[cfg(test)]
mod tests {
    use super::*;
    use seathold_core::environment::Clock;

    #[test]
    fn fixed_clock_never_moves() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn stepping_clock_shares_time_across_clones() {
        let clock = stepping_clock();
        let shared = clock.clone();

        let before = shared.now();
        clock.advance(chrono::Duration::seconds(9));

        assert_eq!(shared.now() - before, chrono::Duration::seconds(9));
    }
}
