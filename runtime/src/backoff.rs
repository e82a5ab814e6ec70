//! Global rate-limit backoff window.
//!
//! When the availability endpoint answers 429, every *non-forced* refresh —
//! for any trip — is suppressed for a fixed window. Forced refreshes (the
//! ones issued right after the shopper's own lock/release) bypass the gate
//! so the shopper always sees their own action reflected.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Lock-free suppression window.
///
/// Holds the deadline as epoch microseconds in an atomic, so polling tasks
/// can check it on every tick without taking a lock. Time is passed in by
/// the caller (who owns a `Clock`), keeping the gate deterministic in tests.
///
/// Arming an already-armed gate extends the deadline only forward; a stray
/// late 429 can never shorten an existing window.
#[derive(Debug, Default)]
pub struct BackoffGate {
    deadline_micros: AtomicI64,
}

impl BackoffGate {
    /// Create a disarmed gate
    #[must_use]
    pub const fn new() -> Self {
        Self {
            deadline_micros: AtomicI64::new(0),
        }
    }

    /// Arm the gate for `window` starting at `now`
    pub fn arm(&self, now: DateTime<Utc>, window: Duration) {
        // Truncation acceptable: windows are seconds, not centuries
        #[allow(clippy::cast_possible_truncation)]
        let deadline = now.timestamp_micros() + window.as_micros() as i64;
        self.deadline_micros.fetch_max(deadline, Ordering::AcqRel);
    }

    /// Whether the gate currently suppresses non-forced refreshes
    #[must_use]
    pub fn is_armed(&self, now: DateTime<Utc>) -> bool {
        self.deadline_micros.load(Ordering::Acquire) > now.timestamp_micros()
    }

    /// Time left in the window, if armed
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let left = self.deadline_micros.load(Ordering::Acquire) - now.timestamp_micros();
        if left > 0 {
            // left > 0 was just checked, the cast cannot lose the sign
            #[allow(clippy::cast_sign_loss)]
            Some(Duration::from_micros(left as u64))
        } else {
            None
        }
    }
}
