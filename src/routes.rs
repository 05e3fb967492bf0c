//! Axum router and HTTP handlers.
//!
//! `build_router` is the single entry point; `main.rs` attaches middleware
//! layers afterwards so tests can drive the bare router.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::auth::{Action, Principal};
use crate::engine::EngineError;
use crate::model::*;
use crate::state::AppState;

const ROUTE_INDEX: &str = "\
QwiSHi API
----------
POST   /openings                  - Create a new shift opening
GET    /openings?companyId=...    - List open shifts for a company
GET    /openings/{openingId}      - Fetch one tracked opening
POST   /openings/{openingId}/fill - Fill a shift opening
GET    /openings/events?companyId=... - Stream opening events (SSE)
";

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/openings", post(create_opening).get(list_openings))
        .route("/openings/events", get(opening_events))
        .route("/openings/:opening_id", get(get_opening))
        .route("/openings/:opening_id/fill", post(fill_opening))
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// Engine error carried to the HTTP edge.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(EngineError::Validation(rejection.body_text()))
    }
}

pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Authorization(_) => StatusCode::UNAUTHORIZED,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExternalApi(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Principal extraction ─────────────────────────────────────────

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, st: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(st.principals.resolve(bearer(parts))?)
    }
}

// ── GET / and /health ────────────────────────────────────────────

pub(crate) async fn index() -> &'static str {
    ROUTE_INDEX
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub openings_tracked: usize,
}

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            openings_tracked: st.engine.store().len(),
        }),
    )
}

// ── POST /openings ───────────────────────────────────────────────

pub(crate) async fn create_opening(
    State(st): State<Arc<AppState>>,
    principal: Principal,
    payload: Result<Json<CreateOpening>, JsonRejection>,
) -> Result<(StatusCode, Json<Opening>), ApiError> {
    let Json(req) = payload?;
    let opening = st.engine.create_opening(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(opening)))
}

// ── GET /openings ────────────────────────────────────────────────

pub(crate) async fn list_openings(
    State(st): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<OpeningQuery>,
) -> Result<Json<Vec<Opening>>, ApiError> {
    let openings = st.engine.list_openings(&principal, query).await?;
    Ok(Json(openings))
}

// ── GET /openings/{id} ───────────────────────────────────────────

pub(crate) async fn get_opening(
    State(st): State<Arc<AppState>>,
    principal: Principal,
    Path(opening_id): Path<String>,
) -> Result<Json<Opening>, ApiError> {
    Ok(Json(st.engine.get_opening(&principal, &opening_id)?))
}

// ── POST /openings/{id}/fill ─────────────────────────────────────

pub(crate) async fn fill_opening(
    State(st): State<Arc<AppState>>,
    principal: Principal,
    Path(opening_id): Path<String>,
    payload: Result<Json<FillOpening>, JsonRejection>,
) -> Result<Json<Opening>, ApiError> {
    let Json(req) = payload?;
    let opening = st.engine.fill_opening(&principal, &opening_id, req).await?;
    Ok(Json(opening))
}

// ── GET /openings/events ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub company_id: Option<String>,
}

pub(crate) async fn opening_events(
    State(st): State<Arc<AppState>>,
    principal: Principal,
    Query(q): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    principal.authorize(Action::WatchEvents)?;
    let company_id = q
        .company_id
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| EngineError::Validation("missing query parameter: companyId".into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    let events = broadcast_to_sse(st.engine.subscribe(&company_id));
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response())
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<OpeningEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(ev) => {
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(ev.name()).data(data)))
            }
            Err(_) => None, // lagged
        }
    })
}
