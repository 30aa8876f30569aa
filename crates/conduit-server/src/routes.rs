//! HTTP routes.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/` | Service banner |
//! | GET | `/healthz` | Liveness |
//! | POST | `/upload` | Ingest one document (`multipart/form-data`, part `file`) |
//! | POST | `/crm` | Simulated CRM sink |
//! | POST | `/risk_alert` | Simulated risk alert sink |
//! | GET | `/audit` | All action events |
//! | GET | `/audit/{kind}` | Action events for one verb |
//! | GET | `/events` | Filtered event read |

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    routing::{get, post},
};
use conduit_core::IngestResponse;
use conduit_memory::{Event, EventFilter, keys};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Action verbs accepted by `/audit/{kind}`.
pub const AUDIT_KINDS: [&str; 4] = ["store", "alert", "escalate", "log"];

const UPLOAD_PART: &str = "file";

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(handle_root))
        .route("/healthz", get(handle_health))
        .route("/upload", post(handle_upload).layer(upload_limit))
        .route("/crm", post(handle_crm))
        .route("/risk_alert", post(handle_risk_alert))
        .route("/audit", get(handle_audit))
        .route("/audit/{kind}", get(handle_audit_kind))
        .route("/events", get(handle_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_root() -> Json<Value> {
    Json(json!({
        "message": "Conduit service is running; ready to process files and text inputs."
    }))
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "ok": true, "service": "conduit-server" }))
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        if field.name() != Some(UPLOAD_PART) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let raw = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read upload", e))?;

        let response = state.dispatcher.handle_ingest(&raw, &filename).await?;
        return Ok(Json(response));
    }

    Err(ApiError::BadRequest(format!(
        "Missing `{}` part in multipart body",
        UPLOAD_PART
    )))
}

/// Oversized bodies are 413; anything else wrong with the multipart body is 400.
fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    let message = format!("{}: {}", context, err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::BadRequest(message)
    }
}

/// Body posted by the action router to the simulated sinks.
#[derive(Debug, Deserialize)]
pub struct ActionNotice {
    pub action: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SinkResponse {
    pub status: &'static str,
    pub detail: SinkDetail,
}

#[derive(Debug, Serialize)]
pub struct SinkDetail {
    pub message: String,
}

impl SinkResponse {
    fn received(message: String) -> Json<Self> {
        Json(Self {
            status: "success",
            detail: SinkDetail { message },
        })
    }
}

async fn handle_crm(Json(notice): Json<ActionNotice>) -> Json<SinkResponse> {
    tracing::info!(action = %notice.action, timestamp = ?notice.timestamp, "CRM notice received");
    SinkResponse::received(format!("CRM escalation received: {}", notice.action))
}

async fn handle_risk_alert(Json(notice): Json<ActionNotice>) -> Json<SinkResponse> {
    tracing::info!(action = %notice.action, timestamp = ?notice.timestamp, "Risk alert received");
    SinkResponse::received(format!("Risk alert received: {}", notice.action))
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub actions: Vec<Event>,
}

async fn handle_audit(State(state): State<Arc<AppState>>) -> Result<Json<AuditResponse>, ApiError> {
    let actions = state.memory.read_by_key(keys::ACTION).await?;
    Ok(Json(AuditResponse { actions }))
}

async fn handle_audit_kind(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<AuditResponse>, ApiError> {
    if !AUDIT_KINDS.contains(&kind.as_str()) {
        return Err(ApiError::NotFound(format!("Unknown audit kind: {}", kind)));
    }

    let actions = state
        .memory
        .query(EventFilter {
            key: Some(keys::ACTION.to_string()),
            action: Some(kind),
            ..Default::default()
        })
        .await?;
    Ok(Json(AuditResponse { actions }))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub source: Option<String>,
    pub key: Option<String>,
    pub action: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<EventsQuery> for EventFilter {
    fn from(query: EventsQuery) -> Self {
        Self {
            source: query.source,
            key: query.key,
            action: query.action,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

async fn handle_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let events = state.memory.query(query.into()).await?;
    Ok(Json(EventsResponse { events }))
}
