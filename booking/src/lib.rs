//! # Seathold Booking
//!
//! The seat-reservation coordination core: everything between a shopper's
//! seat tap and the backend inventory service.
//!
//! Shoppers hold seats on a scheduled trip while they walk a multi-step
//! checkout (seats → boarding/dropping points → price → handoff). The core
//! guarantees two things under interleaved async operations:
//!
//! - a seat is never double-sold to two concurrent shoppers *by this
//!   client* — contention across shoppers is the backend's call, and this
//!   client reacts to its accept/reject answer;
//! - no soft lock leaks when the shopper abandons the flow, on any exit
//!   path: trip switch, modify-search, navigation away, logout, another tab
//!   clearing the auth token, or a process that died mid-cleanup.
//!
//! ## Components
//!
//! - [`availability`]: per-trip TTL-cached occupancy with in-flight
//!   de-duplication and a global rate-limit backoff
//! - [`locking`]: optimistic seat acquire/release against the backend
//! - [`draft`]: the per-trip selection state machine (a pure reducer)
//! - [`polling`]: bounded periodic refresh of visible trips
//! - [`registry`]: durable lock bookkeeping plus the at-least-once release
//!   outbox
//! - [`session`]: the single-owner coordinator wiring it all together
//!
//! ## Example
//!
//! ```ignore
//! use seathold_booking::api::HttpBookingApi;
//! use seathold_booking::config::BookingConfig;
//! use seathold_booking::registry::JsonFileRegistryStore;
//! use seathold_booking::session::BookingSession;
//! use seathold_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let config = BookingConfig::from_env();
//! let api = Arc::new(HttpBookingApi::from_config(&config.api, tokens)?);
//! let session = BookingSession::new(
//!     api,
//!     Arc::new(JsonFileRegistryStore::new("seathold-registry.json")),
//!     Arc::new(SystemClock),
//!     config,
//! )?;
//! session.start().await;
//!
//! session.expand_trip(summary, travel_date).await;
//! session.tap_seat(seat).await?.wait().await;
//! let handoff = session.proceed_to_checkout().await?;
//! ```

/// Backend REST seam: the `BookingApi` trait, its reqwest implementation,
/// and the scriptable test mock
pub mod api;

/// Per-trip cached seat availability
pub mod availability;

/// Environment-variable configuration with flow-tuned defaults
pub mod config;

/// The per-trip booking draft state machine
pub mod draft;

/// Optimistic seat locking against the backend
pub mod locking;

/// Periodic availability refresh for the results view
pub mod polling;

/// Durable lock bookkeeping and the release outbox
pub mod registry;

/// The single-owner booking session
pub mod session;

/// Domain value types shared across the core
pub mod types;

pub use api::{ApiError, BookingApi, HttpBookingApi, NoToken, TokenProvider};
pub use availability::{AvailabilitySnapshot, AvailabilitySnapshotStore};
pub use config::BookingConfig;
pub use draft::{DraftAction, DraftNotice, DraftPhase, DraftState};
pub use locking::{LockCoordinator, LockFailure, LockOutcome};
pub use polling::{PollingScheduler, ViewState};
pub use registry::{
    CleanupRegistry, InMemoryRegistryStore, JsonFileRegistryStore, RegistryEntry, RegistryStore,
    ReleaseOutbox,
};
pub use session::{BookingSession, SessionError};
pub use types::{
    BusId, CheckoutHandoff, ClientId, ConvenienceFee, FareRule, Gender, Money, PriceBreakdown,
    SeatId, SeatLock, StopPoint, TripKey, TripSummary,
};
