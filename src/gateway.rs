//! Square Bookings API adapter.
//!
//! Translates QwiSHi's opening vocabulary into the platform's availability and
//! booking records. One HTTP call per operation, no retries: any transport
//! error, non-2xx status, `errors` payload or undecodable body surfaces as a
//! single `EngineError::ExternalApi`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;
use crate::observability;

/// Duration used when the shift bounds cannot be parsed.
pub const FALLBACK_DURATION_MINUTES: i64 = 60;

/// Sent when an opening is not tied to a specific team member.
pub const ANY_TEAM_MEMBER: &str = "ANY_TEAM_MEMBER";

/// Booking note used when the fill request carried none.
pub const DEFAULT_BOOKING_NOTE: &str = "Booked via QwiSHi";

pub const SANDBOX_BASE_URL: &str = "https://connect.squareupsandbox.com";

pub const DEFAULT_SQUARE_VERSION: &str = "2024-01-18";

#[async_trait]
pub trait AvailabilityGateway: Send + Sync {
    async fn create_availability(
        &self,
        merchant_token: &str,
        request: &AvailabilityRequest,
    ) -> Result<ExternalAvailability, EngineError>;

    async fn search_availabilities(
        &self,
        merchant_token: &str,
        location_id: &str,
        service_type_id: &str,
        range_start: &str,
        range_end: &str,
    ) -> Result<Vec<ExternalAvailability>, EngineError>;

    async fn create_booking(
        &self,
        merchant_token: &str,
        request: &BookingRequest,
    ) -> Result<ExternalBooking, EngineError>;
}

/// Whole minutes between two RFC 3339 timestamps.
///
/// Falls back to [`FALLBACK_DURATION_MINUTES`] if either side does not parse.
/// The fallback is a stopgap kept for client compatibility; callers that can
/// reject bad timestamps up front should do so.
pub fn duration_minutes(start_at: &str, end_at: &str) -> i64 {
    match (
        DateTime::parse_from_rfc3339(start_at),
        DateTime::parse_from_rfc3339(end_at),
    ) {
        (Ok(start), Ok(end)) => (end - start).num_minutes(),
        _ => {
            warn!(start_at, end_at, "unparsable shift bounds, using fallback duration");
            FALLBACK_DURATION_MINUTES
        }
    }
}

// ── Square wire format ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateAvailabilityBody<'a> {
    idempotency_key: String,
    availability: AvailabilityPayload<'a>,
}

#[derive(Debug, Serialize)]
struct AvailabilityPayload<'a> {
    start_at: &'a str,
    location_id: &'a str,
    appointment_segments: Vec<AppointmentSegment>,
}

#[derive(Debug, Serialize)]
struct SearchAvailabilityBody<'a> {
    query: SearchQuery<'a>,
}

#[derive(Debug, Serialize)]
struct SearchQuery<'a> {
    filter: SearchFilter<'a>,
}

#[derive(Debug, Serialize)]
struct SearchFilter<'a> {
    start_at_range: TimeRange<'a>,
    location_id: &'a str,
    segment_filters: Vec<SegmentFilter<'a>>,
}

#[derive(Debug, Serialize)]
struct TimeRange<'a> {
    start_at: &'a str,
    end_at: &'a str,
}

#[derive(Debug, Serialize)]
struct SegmentFilter<'a> {
    service_variation_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateBookingBody<'a> {
    idempotency_key: String,
    booking: BookingPayload<'a>,
}

#[derive(Debug, Serialize)]
struct BookingPayload<'a> {
    location_id: &'a str,
    start_at: &'a str,
    appointment_segments: Vec<AppointmentSegment>,
    customer_note: &'a str,
}

#[derive(Debug, Deserialize)]
struct SquareError {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl SquareError {
    fn describe(&self) -> String {
        match (&self.detail, &self.code, &self.category) {
            (Some(d), _, _) => d.clone(),
            (None, Some(c), _) => c.clone(),
            (None, None, Some(cat)) => cat.clone(),
            _ => "unknown error".to_string(),
        }
    }
}

/// Shared envelope: every Square response may carry `errors`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    errors: Vec<SquareError>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    availability: Option<ExternalAvailability>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    availabilities: Option<Vec<ExternalAvailability>>,
}

#[derive(Debug, Deserialize)]
struct BookingResponse {
    booking: Option<ExternalBooking>,
}

// ── HTTP client ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SquareGateway {
    http: reqwest::Client,
    base_url: String,
    square_version: String,
}

impl SquareGateway {
    pub fn new(base_url: String, square_version: String, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::ExternalApi(format!("http client setup failed: {e}")))?;
        Ok(Self::with_client(http, base_url, square_version))
    }

    pub fn with_client(http: reqwest::Client, base_url: String, square_version: String) -> Self {
        Self {
            http,
            base_url,
            square_version,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// POST a JSON body and decode the enveloped response.
    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        call: &'static str,
        path: &str,
        merchant_token: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let started = Instant::now();
        let result = self.send(call, path, merchant_token, body).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::histogram!(observability::GATEWAY_DURATION_SECONDS, "call" => call)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(observability::GATEWAY_CALLS_TOTAL, "call" => call, "outcome" => outcome)
            .increment(1);
        result
    }

    async fn send<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        call: &'static str,
        path: &str,
        merchant_token: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(merchant_token)
            .header("Square-Version", &self.square_version)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::ExternalApi(format!("Square API request failed ({call}): {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EngineError::ExternalApi(format!("Square API response unreadable ({call}): {e}")))?;
        debug!(call, status = status.as_u16(), "square response");

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                EngineError::ExternalApi(format!("Square API response malformed ({call}): {e}"))
            } else {
                EngineError::ExternalApi(format!(
                    "Square API Error ({call}): http status {}",
                    status.as_u16()
                ))
            }
        })?;

        if !envelope.errors.is_empty() {
            let details: Vec<String> = envelope.errors.iter().map(SquareError::describe).collect();
            return Err(EngineError::ExternalApi(format!(
                "Square API Error ({call}): {}",
                details.join(", ")
            )));
        }
        if !status.is_success() {
            return Err(EngineError::ExternalApi(format!(
                "Square API Error ({call}): http status {}",
                status.as_u16()
            )));
        }
        Ok(envelope.body)
    }
}

#[async_trait]
impl AvailabilityGateway for SquareGateway {
    async fn create_availability(
        &self,
        merchant_token: &str,
        request: &AvailabilityRequest,
    ) -> Result<ExternalAvailability, EngineError> {
        let body = CreateAvailabilityBody {
            idempotency_key: Ulid::new().to_string(),
            availability: AvailabilityPayload {
                start_at: &request.start_at,
                location_id: &request.location_id,
                appointment_segments: vec![AppointmentSegment {
                    duration_minutes: Some(duration_minutes(&request.start_at, &request.end_at)),
                    service_variation_id: Some(request.service_type_id.clone()),
                    team_member_id: Some(
                        request
                            .team_member_id
                            .clone()
                            .unwrap_or_else(|| ANY_TEAM_MEMBER.to_string()),
                    ),
                }],
            },
        };
        let resp: AvailabilityResponse = self
            .post("create_availability", "/v2/bookings/availability", merchant_token, &body)
            .await?;
        resp.availability
            .filter(|av| !av.id.is_empty())
            .ok_or_else(|| {
                EngineError::ExternalApi(
                    "Square API response malformed (create_availability): no availability".into(),
                )
            })
    }

    async fn search_availabilities(
        &self,
        merchant_token: &str,
        location_id: &str,
        service_type_id: &str,
        range_start: &str,
        range_end: &str,
    ) -> Result<Vec<ExternalAvailability>, EngineError> {
        let body = SearchAvailabilityBody {
            query: SearchQuery {
                filter: SearchFilter {
                    start_at_range: TimeRange {
                        start_at: range_start,
                        end_at: range_end,
                    },
                    location_id,
                    segment_filters: vec![SegmentFilter {
                        service_variation_id: service_type_id,
                    }],
                },
            },
        };
        let resp: SearchResponse = self
            .post(
                "search_availabilities",
                "/v2/bookings/availability/search",
                merchant_token,
                &body,
            )
            .await?;
        Ok(resp.availabilities.unwrap_or_default())
    }

    async fn create_booking(
        &self,
        merchant_token: &str,
        request: &BookingRequest,
    ) -> Result<ExternalBooking, EngineError> {
        let body = CreateBookingBody {
            idempotency_key: Ulid::new().to_string(),
            booking: BookingPayload {
                location_id: &request.location_id,
                start_at: &request.start_at,
                appointment_segments: vec![AppointmentSegment {
                    duration_minutes: None,
                    service_variation_id: Some(request.service_type_id.clone()),
                    team_member_id: Some(request.team_member_id.clone()),
                }],
                customer_note: request.note.as_deref().unwrap_or(DEFAULT_BOOKING_NOTE),
            },
        };
        let resp: BookingResponse = self
            .post("create_booking", "/v2/bookings", merchant_token, &body)
            .await?;
        resp.booking.filter(|b| !b.id.is_empty()).ok_or_else(|| {
            EngineError::ExternalApi("Square API response malformed (create_booking): no booking".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn gateway(server: &MockServer) -> SquareGateway {
        SquareGateway::new(
            server.base_url(),
            DEFAULT_SQUARE_VERSION.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn shift() -> AvailabilityRequest {
        AvailabilityRequest {
            location_id: "loc1".into(),
            service_type_id: "svcA".into(),
            team_member_id: None,
            start_at: "2024-03-15T09:00:00Z".into(),
            end_at: "2024-03-15T17:00:00Z".into(),
        }
    }

    #[test]
    fn duration_of_a_working_day() {
        assert_eq!(
            duration_minutes("2024-03-15T09:00:00Z", "2024-03-15T17:00:00Z"),
            480
        );
    }

    #[test]
    fn duration_across_offsets() {
        assert_eq!(
            duration_minutes("2024-03-15T09:00:00+01:00", "2024-03-15T09:30:00Z"),
            90
        );
    }

    #[test]
    fn duration_falls_back_when_unparsable() {
        assert_eq!(duration_minutes("tomorrow", "2024-03-15T17:00:00Z"), 60);
        assert_eq!(duration_minutes("2024-03-15T09:00:00Z", ""), 60);
        assert_eq!(duration_minutes("x", "y"), FALLBACK_DURATION_MINUTES);
    }

    #[tokio::test]
    async fn create_availability_sends_segment_and_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/bookings/availability")
                    .header("authorization", "Bearer tok-1")
                    .header("square-version", DEFAULT_SQUARE_VERSION)
                    .json_body_partial(
                        r#"{"availability":{"start_at":"2024-03-15T09:00:00Z","location_id":"loc1",
                            "appointment_segments":[{"duration_minutes":480,
                            "service_variation_id":"svcA","team_member_id":"ANY_TEAM_MEMBER"}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "availability": {
                        "id": "av1",
                        "start_at": "2024-03-15T09:00:00Z",
                        "location_id": "loc1"
                    }
                }));
            })
            .await;

        let av = gateway(&server)
            .create_availability("tok-1", &shift())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(av.id, "av1");
        assert_eq!(av.start_at.as_deref(), Some("2024-03-15T09:00:00Z"));
    }

    #[tokio::test]
    async fn platform_errors_surface_their_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/bookings/availability");
                then.status(400).json_body(json!({
                    "errors": [
                        {"category": "INVALID_REQUEST_ERROR", "code": "BAD_REQUEST", "detail": "start_at is in the past"},
                        {"category": "INVALID_REQUEST_ERROR", "code": "MISSING_REQUIRED_PARAMETER"}
                    ]
                }));
            })
            .await;

        let err = gateway(&server)
            .create_availability("tok-1", &shift())
            .await
            .unwrap_err();
        match err {
            EngineError::ExternalApi(msg) => {
                assert!(msg.contains("start_at is in the past"), "{msg}");
                assert!(msg.contains("MISSING_REQUIRED_PARAMETER"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_an_external_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/bookings/availability");
                then.status(200).body("<html>gateway timeout</html>");
            })
            .await;

        let err = gateway(&server)
            .create_availability("tok-1", &shift())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ExternalApi(_)));
    }

    #[tokio::test]
    async fn missing_availability_is_an_external_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/bookings/availability");
                then.status(200).json_body(json!({}));
            })
            .await;

        let err = gateway(&server)
            .create_availability("tok-1", &shift())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ExternalApi(_)));
    }

    #[tokio::test]
    async fn search_filters_by_location_and_service() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/bookings/availability/search")
                    .json_body_partial(
                        r#"{"query":{"filter":{"location_id":"loc1",
                            "start_at_range":{"start_at":"2024-03-01T00:00:00Z","end_at":"2024-03-31T23:59:59Z"},
                            "segment_filters":[{"service_variation_id":"svcA"}]}}}"#,
                    );
                then.status(200).json_body(json!({
                    "availabilities": [
                        {"id": "av1", "start_at": "2024-03-15T09:00:00Z"},
                        {"id": "av2", "location_id": "loc1",
                         "appointment_segments": [{"team_member_id": "tm1", "service_variation_id": "svcA"}]}
                    ]
                }));
            })
            .await;

        let found = gateway(&server)
            .search_availabilities(
                "tok-1",
                "loc1",
                "svcA",
                "2024-03-01T00:00:00Z",
                "2024-03-31T23:59:59Z",
            )
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].first_segment().unwrap().team_member_id.as_deref(), Some("tm1"));
    }

    #[tokio::test]
    async fn search_without_results_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/bookings/availability/search");
                then.status(200).json_body(json!({}));
            })
            .await;

        let found = gateway(&server)
            .search_availabilities("tok-1", "loc1", "svcA", "a", "b")
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn booking_uses_default_note() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/bookings").json_body_partial(
                    r#"{"booking":{"location_id":"loc1","start_at":"2024-03-15T09:00:00Z",
                        "customer_note":"Booked via QwiSHi",
                        "appointment_segments":[{"service_variation_id":"svcA","team_member_id":"tm1"}]}}"#,
                );
                then.status(200).json_body(json!({
                    "booking": {"id": "bk1", "status": "ACCEPTED"}
                }));
            })
            .await;

        let booking = gateway(&server)
            .create_booking(
                "tok-1",
                &BookingRequest {
                    availability_id: Some("av1".into()),
                    location_id: "loc1".into(),
                    service_type_id: "svcA".into(),
                    start_at: "2024-03-15T09:00:00Z".into(),
                    team_member_id: "tm1".into(),
                    note: None,
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(booking.id, "bk1");
        assert_eq!(booking.status.as_deref(), Some("ACCEPTED"));
    }

    #[tokio::test]
    async fn unreachable_platform_is_an_external_error() {
        let gw = SquareGateway::new(
            "http://127.0.0.1:9".to_string(),
            DEFAULT_SQUARE_VERSION.to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = gw.create_availability("tok-1", &shift()).await.unwrap_err();
        assert!(matches!(err, EngineError::ExternalApi(_)));
    }
}
