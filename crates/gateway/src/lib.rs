//! HTTP gateway for Clonechat.
//!
//! Exposes the shared conversation over REST, and streams every commit to
//! connected readers as Server-Sent Events, so any number of clients see
//! the same ordered log in real time.
//!
//! The gateway runs one controller under the process's single session.
//! Every HTTP client therefore writes user entries with the same
//! `author_id`, and a submit that arrives while another client's cycle is
//! in flight is answered `409 Conflict`. Clients wanting distinct
//! identities run their own `clonechat` process.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use clonechat_agent::ChatController;
use clonechat_config::GatewayConfig;

/// Build the full router: health check plus the nested v1 API.
///
/// Layers applied:
/// - CORS restricted to the local development origin
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(controller: Arc<ChatController>) -> Router {
    let api_state = Arc::new(api_v1::ApiV1State { controller });

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:8080"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until the process exits.
pub async fn start(
    config: &GatewayConfig,
    controller: Arc<ChatController>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(controller);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
