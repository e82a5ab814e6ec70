//! HTTP-level tests for the reqwest client: endpoint shapes, status
//! mapping, and bearer-token attachment, against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use seathold_booking::api::{ApiError, BookingApi, HttpBookingApi, NoToken, SearchQuery, TokenProvider};
use seathold_booking::{BusId, ClientId, Gender, SeatId, TripKey};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticToken(&'static str);

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

fn trip() -> TripKey {
    let date = chrono::NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
    TripKey::new(BusId::new("bus-1"), date, "08:30")
}

#[tokio::test]
async fn availability_request_carries_date_and_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings/availability/bus-1"))
        .and(query_param("date", "2025-02-01"))
        .and(query_param("departureTime", "08:30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "availableSeats": 12,
            "availableWindowSeats": 4,
            "bookedSeats": ["3", "7"],
            "seatGenderMap": { "3": "F", "7": "M" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(NoToken));
    let payload = api.fetch_availability(&trip()).await.expect("fetch ok");

    assert_eq!(payload.available_seats, 12);
    assert_eq!(payload.available_window_seats, Some(4));
    assert_eq!(payload.booked_seats, [SeatId::new("3"), SeatId::new("7")]);
    assert_eq!(
        payload.seat_gender_map.get(&SeatId::new("3")),
        Some(&Gender::Female)
    );
}

#[tokio::test]
async fn rate_limit_and_auth_statuses_map_to_typed_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings/availability/bus-1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings/availability/bus-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(NoToken));

    assert!(matches!(
        api.fetch_availability(&trip()).await,
        Err(ApiError::RateLimited)
    ));
    assert!(matches!(
        api.fetch_availability(&trip()).await,
        Err(ApiError::Unauthorized)
    ));
}

#[tokio::test]
async fn lock_sends_the_wire_body_and_bearer_token() {
    let server = MockServer::start().await;
    let client_id = ClientId::new();
    Mock::given(method("POST"))
        .and(path("/bookings/lock"))
        .and(header("authorization", "Bearer token-123"))
        .and(body_partial_json(json!({
            "busId": "bus-1",
            "date": "2025-02-01",
            "departureTime": "08:30",
            "seats": ["12"],
            "clientId": client_id.as_uuid(),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(StaticToken("token-123")));
    let response = api
        .lock_seats(&trip(), &[SeatId::new("12")], client_id)
        .await
        .expect("lock ok");

    assert!(response.ok);
}

#[tokio::test]
async fn http_conflict_is_a_lost_race_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bookings/lock"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(NoToken));
    let response = api
        .lock_seats(&trip(), &[SeatId::new("12")], ClientId::new())
        .await
        .expect("conflict is a normal answer");

    assert!(!response.ok);
}

#[tokio::test]
async fn release_is_a_delete_with_the_same_body_shape() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/bookings/release"))
        .and(body_partial_json(json!({
            "busId": "bus-1",
            "seats": ["3", "4"],
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(NoToken));
    let result = api
        .release_seats(
            &trip(),
            &[SeatId::new("3"), SeatId::new("4")],
            ClientId::new(),
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn search_deserializes_only_the_relevant_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buses"))
        .and(query_param("from", "Mumbai"))
        .and(query_param("to", "Pune"))
        .and(query_param("date", "2025-02-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "_id": "bus-9",
            "operatorName": "irrelevant",
            "rating": 4.2,
            "departureTime": "21:15",
            "price": 750,
            "convenienceFee": 2.5,
            "convenienceFeeType": "percentage",
            "fares": [
                { "boardingPoint": "Central", "droppingPoint": "Airport", "price": 820.5 }
            ],
            "boardingPoints": ["Central", "Mall"],
            "droppingPoints": ["Airport"],
            "seatLayout": ["1", "2", "3"]
        }])))
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(NoToken));
    let trips = api
        .search_trips(&SearchQuery {
            from: "Mumbai".to_string(),
            to: "Pune".to_string(),
            date: "2025-02-01".to_string(),
        })
        .await
        .expect("search ok");

    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].bus_id, BusId::new("bus-9"));
    assert_eq!(trips[0].seat_layout.len(), 3);
}

#[tokio::test]
async fn server_errors_map_to_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/bookings/release"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = HttpBookingApi::new(server.uri(), Arc::new(NoToken));
    let result = api
        .release_seats(&trip(), &[SeatId::new("1")], ClientId::new())
        .await;

    assert!(matches!(result, Err(ApiError::RequestFailed(_))));
}
