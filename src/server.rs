//! Router assembly and background task startup.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::persistence::{EventSink, PersistenceWorker};
use crate::service::run_offline_sweeper;
use crate::ws::handler::ws_handler;
use crate::ws::run_heartbeat;

/// Upper bound on a single REST request. Does not apply to upgraded
/// WebSocket connections once the handshake has completed.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the full HTTP router: REST API, `/ws`, and (with the
/// `swagger-ui` feature) the interactive API docs.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route("/api-docs/openapi.json", get(openapi_json));

    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(not(feature = "swagger-ui"))]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    axum::Json(api::ApiDoc::openapi())
}

/// Spawns the offline sweeper, the heartbeat, and the persistence worker.
/// Each task stops once `shutdown` flips to `true`.
pub fn spawn_background_tasks<S: EventSink>(
    state: &AppState,
    config: &GatewayConfig,
    sink: S,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let sweeper = tokio::spawn(run_offline_sweeper(
        state.tracking.as_ref().clone(),
        config.sweep_interval(),
        shutdown.clone(),
    ));

    let heartbeat = tokio::spawn(run_heartbeat(
        Arc::clone(&state.connections),
        config.heartbeat_interval(),
        shutdown.clone(),
    ));

    let worker = PersistenceWorker::new(
        Arc::clone(state.tracking.queue()),
        sink,
        config.persist_batch_size,
        config.persist_flush_interval(),
    );
    let persistence = tokio::spawn(worker.run(shutdown.clone()));

    vec![sweeper, heartbeat, persistence]
}
