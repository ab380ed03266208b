//! System endpoints: health check and process stats.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{HealthResponse, StatsResponse};
use crate::app_state::AppState;
use crate::domain::now_ms;

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, server time, and the number of live stream connections.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            ts: now_ms(),
            clients: state.connections.len().await,
        }),
    )
}

/// `GET /api/v1/stats`: Ingestion counters and store figures.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "System",
    summary = "Process stats",
    description = "Returns counters for accepted, rejected, and dropped reports, offline transitions, store sizes, and persistence queue depth.",
    responses(
        (status = 200, description = "Current stats", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.tracking.stats().await;
    let clients = state.connections.len().await;
    Json(StatsResponse::new(stats, clients))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
