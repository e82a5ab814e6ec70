//! Reqwest implementation of the booking backend seam.

use super::{
    ApiError, AvailabilityPayload, BookingApi, LockRequest, LockResponse, SearchQuery,
    TokenProvider,
};
use crate::config::ApiConfig;
use crate::types::{
    BusId, ClientId, ConvenienceFee, FareRule, Money, SeatId, StopPoint, TripKey, TripSummary,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Booking backend client over HTTP
#[derive(Clone)]
pub struct HttpBookingApi {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpBookingApi {
    /// Create a client with the default reqwest configuration
    #[must_use]
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Create a client from configuration (applies the request timeout)
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RequestFailed`] if the underlying client cannot
    /// be constructed.
    pub fn from_config(
        config: &ApiConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            tokens,
        })
    }

    /// Attach the bearer token when the shopper is signed in
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map non-success statuses into the error taxonomy
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::BadRequest(body))
            },
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::RequestFailed(format!("status {status}: {body}")))
            },
        }
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn fetch_availability(&self, trip: &TripKey) -> Result<AvailabilityPayload, ApiError> {
        let url = format!(
            "{}/bookings/availability/{}",
            self.base_url,
            trip.bus_id.as_str()
        );

        let response = self
            .authorize(self.client.get(url))
            .query(&[
                ("date", trip.date_param()),
                ("departureTime", trip.departure_time.clone()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<AvailabilityPayload>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }

    async fn lock_seats(
        &self,
        trip: &TripKey,
        seats: &[SeatId],
        client_id: ClientId,
    ) -> Result<LockResponse, ApiError> {
        let url = format!("{}/bookings/lock", self.base_url);
        let body = LockRequest::new(trip, seats, client_id);

        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        // A contended seat answers 409; that is a normal "not yours" result,
        // not a failure of the call
        if response.status() == StatusCode::CONFLICT {
            return Ok(LockResponse { ok: false });
        }

        Self::check(response)
            .await?
            .json::<LockResponse>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }

    async fn release_seats(
        &self,
        trip: &TripKey,
        seats: &[SeatId],
        client_id: ClientId,
    ) -> Result<(), ApiError> {
        let url = format!("{}/bookings/release", self.base_url);
        let body = LockRequest::new(trip, seats, client_id);

        let response = self
            .authorize(self.client.delete(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn search_trips(&self, query: &SearchQuery) -> Result<Vec<TripSummary>, ApiError> {
        let url = format!("{}/buses", self.base_url);

        let response = self
            .authorize(self.client.get(url))
            .query(&[
                ("from", query.from.as_str()),
                ("to", query.to.as_str()),
                ("date", query.date.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let records = Self::check(response)
            .await?
            .json::<Vec<TripRecord>>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))?;

        Ok(records.into_iter().map(TripRecord::into_summary).collect())
    }
}

// ============================================================================
// Wire records
// ============================================================================

/// One trip as the search endpoint lists it; unknown fields are ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripRecord {
    #[serde(rename = "_id")]
    id: String,
    departure_time: String,
    price: f64,
    #[serde(default)]
    convenience_fee: f64,
    #[serde(default)]
    convenience_fee_type: Option<String>,
    #[serde(default)]
    fares: Vec<FareRecord>,
    #[serde(default)]
    boarding_points: Vec<String>,
    #[serde(default)]
    dropping_points: Vec<String>,
    #[serde(default)]
    seat_layout: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FareRecord {
    boarding_point: String,
    dropping_point: String,
    price: f64,
}

impl TripRecord {
    fn into_summary(self) -> TripSummary {
        let convenience_fee = match self.convenience_fee_type.as_deref() {
            // Percent values arrive as e.g. 2.5, basis points want 250
            Some("percentage" | "percent") => {
                ConvenienceFee::PercentOfBase(to_basis_points(self.convenience_fee))
            },
            _ => ConvenienceFee::FlatPerSeat(money_from_major(self.convenience_fee)),
        };

        TripSummary {
            bus_id: BusId::new(self.id),
            departure_time: self.departure_time,
            price: money_from_major(self.price),
            convenience_fee,
            fares: self
                .fares
                .into_iter()
                .map(|fare| FareRule {
                    boarding: StopPoint::new(fare.boarding_point),
                    dropping: StopPoint::new(fare.dropping_point),
                    price: money_from_major(fare.price),
                })
                .collect(),
            boarding_points: self.boarding_points.into_iter().map(StopPoint::new).collect(),
            dropping_points: self.dropping_points.into_iter().map(StopPoint::new).collect(),
            seat_layout: self.seat_layout.into_iter().map(SeatId::new).collect(),
        }
    }
}

/// Convert a wire amount in major units to `Money`, rounding to the paisa
fn money_from_major(amount: f64) -> Money {
    // Negative or absurd amounts clamp to zero; the backend owns validation
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Money::from_minor((amount.max(0.0) * 100.0).round() as u64)
}

/// Convert a wire percentage (`2.5` = 2.5%) to basis points
fn to_basis_points(percent: f64) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bp = (percent.max(0.0) * 100.0).round() as u32;
    bp
}
