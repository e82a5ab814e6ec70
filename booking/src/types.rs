//! Domain types shared across the seat-reservation core.
//!
//! Value objects for trips, seats, money, and the frozen checkout handoff.
//! Component-owned state (availability snapshots, draft state, registry
//! entries) lives with its owning module.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Backend identifier of a bus (the `_id` field of the search results)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusId(String);

impl BusId {
    /// Create a `BusId` from the backend identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A seat label from the bus layout (`"12"`, `"L5"`, ...)
///
/// Seat identifiers are backend-assigned strings, not indices; ordering is
/// lexicographic so selections render deterministically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(String);

impl SeatId {
    /// Create a `SeatId` from a layout label
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable per-browser-session client identity
///
/// Generated once per session and attached to every lock/release call so the
/// backend can tell this shopper's holds apart from everyone else's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generate a new client identity
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID (e.g. restored from session storage)
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Trips
// ============================================================================

/// Identifier for one sellable trip instance: a bus on a date at a time
///
/// Immutable once constructed; used as the key for snapshots, drafts, and
/// registry entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripKey {
    /// The bus operating the trip
    pub bus_id: BusId,
    /// Departure date (the search date)
    pub departure_date: NaiveDate,
    /// Departure time as listed by the backend (`"08:30"`)
    pub departure_time: String,
}

impl TripKey {
    /// Construct a trip key
    pub fn new(bus_id: BusId, departure_date: NaiveDate, departure_time: impl Into<String>) -> Self {
        Self {
            bus_id,
            departure_date,
            departure_time: departure_time.into(),
        }
    }

    /// Departure date formatted the way the backend expects (`YYYY-MM-DD`)
    #[must_use]
    pub fn date_param(&self) -> String {
        self.departure_date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} {}",
            self.bus_id, self.departure_date, self.departure_time
        )
    }
}

/// Passenger gender attached to a held seat
///
/// Some operators restrict adjacent seating by gender; the backend tracks a
/// gender per booked seat and the client sends one per held seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male passenger
    #[serde(rename = "M")]
    Male,
    /// Female passenger
    #[serde(rename = "F")]
    Female,
}

/// A boarding or dropping point on the route
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopPoint(String);

impl StopPoint {
    /// Create a stop point from its listed name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The listed name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money & fares
// ============================================================================

/// Monetary amount in minor units (paise)
///
/// All arithmetic stays in integers; percentage fees go through basis
/// points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Create a `Money` value from major units (rupees)
    #[must_use]
    pub const fn from_major(major: u64) -> Self {
        Self(major * 100)
    }

    /// The amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Whether the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Add two amounts, saturating at the ceiling
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiply by a count, saturating at the ceiling
    #[must_use]
    pub const fn saturating_mul(self, count: u32) -> Self {
        Self(self.0.saturating_mul(count as u64))
    }

    /// Percentage of this amount expressed in basis points (1/100 of a
    /// percent), rounded down
    #[must_use]
    pub const fn basis_points(self, bp: u32) -> Self {
        Self(self.0.saturating_mul(bp as u64) / 10_000)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Per-trip convenience fee configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvenienceFee {
    /// Flat amount charged per held seat
    FlatPerSeat(Money),
    /// Percentage of the base price, in basis points
    PercentOfBase(u32),
}

impl ConvenienceFee {
    /// Compute the fee for a base price covering `seat_count` seats
    #[must_use]
    pub const fn compute(&self, base_price: Money, seat_count: u32) -> Money {
        match self {
            Self::FlatPerSeat(per_seat) => per_seat.saturating_mul(seat_count),
            Self::PercentOfBase(bp) => base_price.basis_points(*bp),
        }
    }
}

/// Trip-specific fare for a `(boarding, dropping)` pair
///
/// When no rule matches the chosen pair, pricing falls back to the trip's
/// base price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareRule {
    /// Boarding point the rule applies to
    pub boarding: StopPoint,
    /// Dropping point the rule applies to
    pub dropping: StopPoint,
    /// Per-seat price for the pair
    pub price: Money,
}

/// The slice of a search result this core cares about
///
/// The search collaborator returns much more (amenities, ratings, layout
/// geometry); only the fields that drive holding and pricing are kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSummary {
    /// The bus operating the trip
    pub bus_id: BusId,
    /// Departure time as listed (`"08:30"`)
    pub departure_time: String,
    /// Base per-seat price when no fare rule matches
    pub price: Money,
    /// Convenience fee configuration
    pub convenience_fee: ConvenienceFee,
    /// Pair-specific fares
    pub fares: Vec<FareRule>,
    /// Boarding points in listing order (first is the default)
    pub boarding_points: Vec<StopPoint>,
    /// Dropping points in listing order (first is the default)
    pub dropping_points: Vec<StopPoint>,
    /// All seat labels of the layout
    pub seat_layout: Vec<SeatId>,
}

impl TripSummary {
    /// The trip key for this summary on a given travel date
    #[must_use]
    pub fn trip_key(&self, date: NaiveDate) -> TripKey {
        TripKey::new(self.bus_id.clone(), date, self.departure_time.clone())
    }

    /// Per-seat price for a chosen pair, falling back to the base price
    #[must_use]
    pub fn price_for(&self, boarding: &StopPoint, dropping: &StopPoint) -> Money {
        self.fares
            .iter()
            .find(|rule| &rule.boarding == boarding && &rule.dropping == dropping)
            .map_or(self.price, |rule| rule.price)
    }
}

// ============================================================================
// Locks & handoff
// ============================================================================

/// A soft hold this client currently owns on one seat
///
/// Created only after a successful lock call; destroyed on release or
/// cleanup sweep regardless of whether the release call itself succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLock {
    /// Trip the hold belongs to
    pub trip: TripKey,
    /// The held seat
    pub seat: SeatId,
    /// Owner of the hold
    pub client_id: ClientId,
    /// When the backend confirmed the hold
    pub acquired_at: DateTime<Utc>,
}

/// Computed pricing for the current selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Per-seat price after fare-rule lookup
    pub price_per_seat: Money,
    /// `price_per_seat × |selected seats|`
    pub base_price: Money,
    /// Flat or percentage fee per trip configuration
    pub convenience_fee: Money,
    /// `base_price + convenience_fee`
    pub total_price: Money,
}

/// The frozen draft handed to the checkout collaborator
///
/// Produced by a successful proceed; the seats listed here are still held on
/// the backend — handing off deliberately skips cleanup for this trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutHandoff {
    /// Trip being booked
    pub trip: TripKey,
    /// Seats in selection order
    pub seats: Vec<SeatId>,
    /// Gender per held seat
    pub seat_genders: Vec<(SeatId, Gender)>,
    /// Chosen boarding point
    pub boarding_point: StopPoint,
    /// Chosen dropping point
    pub dropping_point: StopPoint,
    /// Final computed pricing
    pub pricing: PriceBreakdown,
    /// The identity the locks were taken under
    pub client_id: ClientId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_arithmetic_is_integer_only() {
        let base = Money::from_major(450).saturating_mul(3);
        assert_eq!(base, Money::from_minor(135_000));
        assert_eq!(base.basis_points(250), Money::from_minor(3_375)); // 2.5%
    }

    #[test]
    fn convenience_fee_modes() {
        let base = Money::from_major(1000);
        assert_eq!(
            ConvenienceFee::FlatPerSeat(Money::from_major(25)).compute(base, 4),
            Money::from_major(100)
        );
        assert_eq!(
            ConvenienceFee::PercentOfBase(500).compute(base, 4),
            Money::from_major(50)
        );
    }

    #[test]
    fn fare_rule_lookup_falls_back_to_base_price() {
        let summary = TripSummary {
            bus_id: BusId::new("b1"),
            departure_time: "08:30".to_string(),
            price: Money::from_major(500),
            convenience_fee: ConvenienceFee::FlatPerSeat(Money::from_major(10)),
            fares: vec![FareRule {
                boarding: StopPoint::new("Central"),
                dropping: StopPoint::new("Airport"),
                price: Money::from_major(650),
            }],
            boarding_points: vec![StopPoint::new("Central")],
            dropping_points: vec![StopPoint::new("Airport"), StopPoint::new("Harbor")],
            seat_layout: vec![SeatId::new("1"), SeatId::new("2")],
        };

        assert_eq!(
            summary.price_for(&StopPoint::new("Central"), &StopPoint::new("Airport")),
            Money::from_major(650)
        );
        assert_eq!(
            summary.price_for(&StopPoint::new("Central"), &StopPoint::new("Harbor")),
            Money::from_major(500)
        );
    }

    #[test]
    fn gender_wire_format_matches_backend() {
        let Ok(json) = serde_json::to_string(&Gender::Female) else {
            return;
        };
        assert_eq!(json, "\"F\"");
    }
}
