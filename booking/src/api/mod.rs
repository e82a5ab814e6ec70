//! Backend seam for the booking inventory service.
//!
//! The core never talks HTTP directly; everything goes through
//! [`BookingApi`], which the production [`HttpBookingApi`] implements and
//! tests replace with [`mock::MockBookingApi`].

use crate::types::{ClientId, Gender, SeatId, TripKey, TripSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::HttpBookingApi;

/// Errors that can occur when talking to the booking backend
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// HTTP request failed at transport level, or the server answered 5xx
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Rate limited - too many requests
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Unauthorized - no or invalid bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend rejected the request shape
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),
}

impl ApiError {
    /// Whether a lock call failing with this error degrades to a skipped
    /// lock (selection kept, no hard reservation) instead of a rollback
    #[must_use]
    pub const fn degrades_lock_to_skip(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::BadRequest(_))
    }
}

/// Availability payload for one trip, as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPayload {
    /// Seats still open on the trip
    pub available_seats: u32,
    /// Window seats still open, when the layout distinguishes them
    #[serde(default)]
    pub available_window_seats: Option<u32>,
    /// Seats already booked or held by other shoppers
    #[serde(default)]
    pub booked_seats: Vec<SeatId>,
    /// Gender attached to each booked seat
    #[serde(default)]
    pub seat_gender_map: HashMap<SeatId, Gender>,
}

/// Body of lock and release calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    /// Bus operating the trip
    pub bus_id: String,
    /// Travel date (`YYYY-MM-DD`)
    pub date: String,
    /// Departure time as listed
    pub departure_time: String,
    /// Seat labels the call covers
    pub seats: Vec<SeatId>,
    /// Identity of this shopper's session
    pub client_id: ClientId,
}

impl LockRequest {
    /// Build the wire body for a trip, seats, and client
    #[must_use]
    pub fn new(trip: &TripKey, seats: &[SeatId], client_id: ClientId) -> Self {
        Self {
            bus_id: trip.bus_id.as_str().to_string(),
            date: trip.date_param(),
            departure_time: trip.departure_time.clone(),
            seats: seats.to_vec(),
            client_id,
        }
    }
}

/// Backend answer to a lock call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResponse {
    /// `true` when the hold was granted to this client
    pub ok: bool,
}

/// Search query for the trip-list collaborator endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Origin city
    pub from: String,
    /// Destination city
    pub to: String,
    /// Travel date (`YYYY-MM-DD`)
    pub date: String,
}

/// Bearer-token accessor injected by the host application
///
/// Absence of a token degrades locking to "skipped" rather than failing, so
/// unauthenticated shoppers can still browse seat maps.
pub trait TokenProvider: Send + Sync {
    /// The current bearer token, if the shopper is signed in
    fn bearer_token(&self) -> Option<String>;
}

/// Token provider for sessions with no authentication wired up
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// The booking backend operations this core consumes
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Fetch current availability for one trip
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, rate limiting, or an
    /// unparseable response.
    async fn fetch_availability(&self, trip: &TripKey) -> Result<AvailabilityPayload, ApiError>;

    /// Ask the backend to hold seats for this client
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or auth failure; a contended seat
    /// is not an error but `ok: false` in the response.
    async fn lock_seats(
        &self,
        trip: &TripKey,
        seats: &[SeatId],
        client_id: ClientId,
    ) -> Result<LockResponse, ApiError>;

    /// Release previously held seats
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure; callers treat release as
    /// best-effort.
    async fn release_seats(
        &self,
        trip: &TripKey,
        seats: &[SeatId],
        client_id: ClientId,
    ) -> Result<(), ApiError>;

    /// Search trips between two cities on a date
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or an unparseable
    /// response.
    async fn search_trips(&self, query: &SearchQuery) -> Result<Vec<TripSummary>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn lock_request_wire_shape() {
        let Some(date) = NaiveDate::from_ymd_opt(2025, 3, 14) else {
            return;
        };
        let trip = TripKey::new(crate::types::BusId::new("bus-1"), date, "08:30");
        let request = LockRequest::new(
            &trip,
            &[SeatId::new("12")],
            ClientId::from_uuid(uuid::Uuid::nil()),
        );

        let Ok(json) = serde_json::to_value(&request) else {
            return;
        };
        assert_eq!(json["busId"], "bus-1");
        assert_eq!(json["date"], "2025-03-14");
        assert_eq!(json["departureTime"], "08:30");
        assert_eq!(json["seats"][0], "12");
    }

    #[test]
    fn availability_payload_tolerates_missing_fields() {
        let parsed: Result<AvailabilityPayload, _> =
            serde_json::from_str(r#"{"availableSeats": 7}"#);
        let Ok(payload) = parsed else {
            return;
        };
        assert_eq!(payload.available_seats, 7);
        assert!(payload.booked_seats.is_empty());
        assert!(payload.available_window_seats.is_none());
    }

    #[test]
    fn auth_failures_degrade_locking() {
        assert!(ApiError::Unauthorized.degrades_lock_to_skip());
        assert!(ApiError::BadRequest("seats".into()).degrades_lock_to_skip());
        assert!(!ApiError::RateLimited.degrades_lock_to_skip());
        assert!(!ApiError::RequestFailed("boom".into()).degrades_lock_to_skip());
    }
}
