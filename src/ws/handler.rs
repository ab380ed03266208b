//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::ConnectionId;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
///
/// The connection joins the registry only once the upgrade completes and
/// leaves it when its loop ends.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    let service = Arc::clone(&state.tracking);
    let registry = Arc::clone(&state.connections);

    ws.on_upgrade(move |socket| async move {
        let connection_id = ConnectionId::new();
        let (alive, control_rx) = registry.register(connection_id).await;
        tracing::debug!(connection_id = %connection_id, "ws connection opened");

        run_connection(socket, connection_id, service, event_rx, control_rx, alive).await;

        registry.remove(connection_id).await;
    })
}
