//! HTTP API v1 — submit, read and follow the shared conversation.
//!
//! Endpoints:
//!
//! - `GET  /v1/messages`         — Current conversation snapshot
//! - `POST /v1/messages`         — Submit a query, run one send cycle
//! - `GET  /v1/messages/stream`  — SSE stream of full snapshots
//! - `GET  /v1/events`           — SSE stream of controller domain events
//! - `GET  /v1/knowledge`        — Knowledge base topics and keywords

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use clonechat_agent::{ChatController, CycleOutcome};
use clonechat_core::entry::{ConversationEntry, Snapshot};
use clonechat_core::error::{CycleError, ValidationError};
use clonechat_core::event::DomainEvent;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub controller: Arc<ChatController>,
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/messages", get(list_messages_handler).post(submit_handler))
        .route("/messages/stream", get(message_stream_handler))
        .route("/events", get(event_stream_handler))
        .route("/knowledge", get(knowledge_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeTopic {
    pub topic: String,
    pub keywords: Vec<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn cycle_error_response(err: &CycleError) -> ApiError {
    let (status, code) = match err {
        CycleError::Rejected(ValidationError::EmptyQuery) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "empty_query")
        }
        CycleError::Rejected(ValidationError::SessionNotReady) => {
            (StatusCode::SERVICE_UNAVAILABLE, "session_not_ready")
        }
        CycleError::Rejected(ValidationError::CycleInFlight) => {
            (StatusCode::CONFLICT, "cycle_in_flight")
        }
        CycleError::Log(_) => (StatusCode::BAD_GATEWAY, "log_error"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.into(),
        }),
    )
}

fn snapshot_event(snapshot: &Snapshot) -> SseEvent {
    let entries: &[ConversationEntry] = snapshot;
    let data = serde_json::to_string(entries).unwrap_or_default();
    SseEvent::default().event("snapshot").data(data)
}

fn event_name(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::CycleStarted { .. } => "cycle_started",
        DomainEvent::SubmitRejected { .. } => "submit_rejected",
        DomainEvent::EntryAppended { .. } => "entry_appended",
        DomainEvent::PassageRetrieved { .. } => "passage_retrieved",
        DomainEvent::GenerationFailed { .. } => "generation_failed",
        DomainEvent::CycleCompleted { .. } => "cycle_completed",
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `GET /v1/messages` — the conversation as an ordered JSON array.
async fn list_messages_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<Vec<ConversationEntry>>, ApiError> {
    let snapshot = state.controller.log().snapshot().await.map_err(|e| {
        warn!(error = %e, "Snapshot read failed");
        cycle_error_response(&CycleError::Log(e))
    })?;
    Ok(Json(snapshot.to_vec()))
}

/// `POST /v1/messages` — run one send cycle.
async fn submit_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<CycleOutcome>, ApiError> {
    info!(chars = payload.text.len(), "v1/messages submit");
    state
        .controller
        .submit(&payload.text)
        .await
        .map(Json)
        .map_err(|e| cycle_error_response(&e))
}

/// `GET /v1/messages/stream` — first the current snapshot, then one per commit.
async fn message_stream_handler(
    State(state): State<SharedApiState>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let subscription = state
        .controller
        .log()
        .subscribe()
        .map_err(|e| cycle_error_response(&CycleError::Log(e)))?;

    let stream = futures::stream::unfold(subscription, |mut subscription| async move {
        let snapshot = subscription.next().await?;
        Some((Ok::<_, Infallible>(snapshot_event(&snapshot)), subscription))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `GET /v1/events` — SSE stream of controller domain events.
async fn event_stream_handler(
    State(state): State<SharedApiState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.controller.event_bus().subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event_name(&event)).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /v1/knowledge` — topics in declaration order.
async fn knowledge_handler(State(state): State<SharedApiState>) -> Json<Vec<KnowledgeTopic>> {
    let topics = state
        .controller
        .retriever()
        .knowledge_base()
        .iter()
        .map(|item| KnowledgeTopic {
            topic: item.topic.clone(),
            keywords: item.keywords.clone(),
        })
        .collect();
    Json(topics)
}
