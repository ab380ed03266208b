//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection:
//! dispatching client frames, forwarding the bound tenant's broadcasts,
//! and obeying heartbeat control messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use super::binding::{BindOutcome, ConnectionBinding};
use super::messages::{
    ClientMessage, ProtocolError, Role, ServerMessage, SnapshotUnit, parse_client_message,
};
use super::registry::Control;
use crate::domain::{Binding, ConnectionId, Outcome, TenantId, TrackingEvent, UnitId, now_ms};
use crate::service::TrackingService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads frames from the client and dispatches them.
/// - Forwards events of the bound tenant from the [`broadcast::Receiver`].
/// - Pings or closes the socket when the heartbeat says so.
pub async fn run_connection(
    socket: WebSocket,
    connection_id: ConnectionId,
    service: Arc<TrackingService>,
    mut event_rx: broadcast::Receiver<TrackingEvent>,
    mut control_rx: mpsc::Receiver<Control>,
    alive: Arc<AtomicBool>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut binding = ConnectionBinding::new();

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => text.to_owned(),
                        Err(_) => {
                            let reply = ServerMessage::protocol_error(ProtocolError::InvalidJson);
                            if !send_json(&mut ws_tx, &reply).await {
                                break;
                            }
                            continue;
                        }
                    },
                    Some(Ok(Message::Pong(_))) => {
                        alive.store(true, Ordering::Release);
                        continue;
                    }
                    Some(Ok(Message::Ping(_))) => continue,
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                };
                let replies = handle_text(&text, &mut binding, &service, now_ms()).await;
                let mut open = true;
                for reply in &replies {
                    if !send_json(&mut ws_tx, reply).await {
                        open = false;
                        break;
                    }
                }
                if !open {
                    break;
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(tracking_event) => {
                        if binding.matches(&tracking_event)
                            && !send_json(&mut ws_tx, &tracking_event).await
                        {
                            tracing::debug!(
                                connection_id = %connection_id,
                                event = tracking_event.event_type_str(),
                                "ws send failed, closing"
                            );
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %connection_id,
                            lagged = n,
                            "ws client lagged behind event bus"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Heartbeat instruction
            control = control_rx.recv() => {
                match control {
                    Some(Control::Ping) => {
                        if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                    Some(Control::Terminate) => {
                        tracing::info!(connection_id = %connection_id, "terminating unresponsive connection");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    binding.close();
    tracing::debug!(connection_id = %connection_id, "ws connection closed");
}

/// Serializes `value` and sends it as a text frame. Returns `false` once
/// the socket is gone.
async fn send_json<T: Serialize>(ws_tx: &mut SplitSink<WebSocket, Message>, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => ws_tx.send(Message::text(json)).await.is_ok(),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize ws frame");
            true
        }
    }
}

/// Handles one client text frame and returns the replies for the sender.
///
/// Accepted reports produce no direct reply; the sender receives the
/// broadcast like every other connection of its tenant. Dropped jumps are
/// silent.
pub(crate) async fn handle_text(
    text: &str,
    binding: &mut ConnectionBinding,
    service: &TrackingService,
    now_ms: i64,
) -> Vec<ServerMessage> {
    match parse_client_message(text) {
        Err(err) => vec![ServerMessage::protocol_error(err)],
        Ok(ClientMessage::Ping) => vec![ServerMessage::Pong { ts: now_ms }],
        Ok(ClientMessage::Register {
            tenant_id,
            unit_id,
            role,
        }) => handle_register(&tenant_id, &unit_id, role, binding, service, now_ms).await,
        Ok(ClientMessage::Position(report)) => {
            match service.ingest(binding.binding(), &report, now_ms).await {
                Outcome::Rejected(rejection) => vec![ServerMessage::rejection(rejection)],
                Outcome::Accepted(_) | Outcome::Dropped { .. } => Vec::new(),
            }
        }
    }
}

async fn handle_register(
    tenant_id: &str,
    unit_id: &str,
    role: Role,
    binding: &mut ConnectionBinding,
    service: &TrackingService,
    now_ms: i64,
) -> Vec<ServerMessage> {
    let requested = match role {
        Role::Viewer => TenantId::parse(tenant_id).map(|tenant_id| Binding::Viewer { tenant_id }),
        Role::Unit => TenantId::parse(tenant_id).and_then(|tenant_id| {
            UnitId::parse(unit_id).map(|unit_id| Binding::Unit { tenant_id, unit_id })
        }),
    };
    let Ok(requested) = requested else {
        return vec![ServerMessage::protocol_error(
            ProtocolError::BadRegisterPayload,
        )];
    };

    let outcome = match binding.bind(requested.clone()) {
        Ok(outcome) => outcome,
        Err(_) => {
            return vec![ServerMessage::protocol_error(
                ProtocolError::AlreadyRegistered,
            )];
        }
    };

    let tenant = requested.tenant_id();
    let mut replies = vec![ServerMessage::Registered {
        tenant_id: tenant.to_string(),
        unit_id: requested.unit_id().map(ToString::to_string),
        role: match role {
            Role::Unit => "unit",
            Role::Viewer => "viewer",
        },
        ts: now_ms,
    }];

    if outcome == BindOutcome::Bound {
        tracing::info!(
            tenant_id = %tenant,
            unit_id = requested.unit_id().map(UnitId::as_str).unwrap_or("-"),
            "connection registered"
        );
        let units = service.snapshot(tenant).await;
        if !units.is_empty() {
            replies.push(ServerMessage::Snapshot {
                tenant_id: tenant.to_string(),
                units: units.into_iter().map(SnapshotUnit::from).collect(),
                ts: now_ms,
            });
        }
    }

    replies
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::TrackingConfig;
    use crate::service::tracking_service::tests::{T0, make_service};

    const REGISTER: &str = r#"{"type":"register","tenantId":"pyme_demo","unitId":"C001"}"#;

    fn pos(unit: &str, lat: f64, lng: f64, ts: i64) -> String {
        serde_json::json!({
            "type": "pos", "tenantId": "pyme_demo", "unitId": unit,
            "lat": lat, "lng": lng, "ts": ts,
        })
        .to_string()
    }

    fn error_code(reply: &ServerMessage) -> &'static str {
        let ServerMessage::Error { error, .. } = reply else {
            panic!("expected error reply, got {reply:?}");
        };
        error
    }

    #[tokio::test]
    async fn register_replies_registered_without_snapshot_for_empty_tenant() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();

        let replies = handle_text(REGISTER, &mut binding, &service, T0).await;
        assert_eq!(replies.len(), 1);
        let ServerMessage::Registered {
            tenant_id, unit_id, role, ..
        } = &replies[0]
        else {
            panic!("expected registered");
        };
        assert_eq!(tenant_id, "pyme_demo");
        assert_eq!(unit_id.as_deref(), Some("C001"));
        assert_eq!(*role, "unit");
    }

    #[tokio::test]
    async fn register_sends_snapshot_when_tenant_has_units() {
        let service = make_service(TrackingConfig::default());
        let mut unit = ConnectionBinding::new();
        let _ = handle_text(REGISTER, &mut unit, &service, T0).await;
        let _ = handle_text(&pos("C001", -34.6, -58.38, T0), &mut unit, &service, T0).await;

        let mut viewer = ConnectionBinding::new();
        let replies = handle_text(
            r#"{"type":"register","tenantId":"pyme_demo","role":"viewer"}"#,
            &mut viewer,
            &service,
            T0,
        )
        .await;
        assert_eq!(replies.len(), 2);
        let ServerMessage::Snapshot { units, .. } = &replies[1] else {
            panic!("expected snapshot");
        };
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_id.as_str(), "C001");
    }

    #[tokio::test]
    async fn register_with_blank_ids_is_bad_payload() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();
        let replies = handle_text(
            r#"{"type":"register","tenantId":"  ","unitId":"C001"}"#,
            &mut binding,
            &service,
            T0,
        )
        .await;
        assert_eq!(error_code(&replies[0]), "bad_register_payload");
        assert!(binding.binding().is_none());
    }

    #[tokio::test]
    async fn register_twice_with_other_identity_is_refused() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();
        let _ = handle_text(REGISTER, &mut binding, &service, T0).await;

        let same = handle_text(REGISTER, &mut binding, &service, T0).await;
        assert!(matches!(same[0], ServerMessage::Registered { .. }));

        let other = handle_text(
            r#"{"type":"register","tenantId":"pyme_demo","unitId":"C002"}"#,
            &mut binding,
            &service,
            T0,
        )
        .await;
        assert_eq!(error_code(&other[0]), "already_registered");
    }

    #[tokio::test]
    async fn pos_before_register_is_not_registered() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();
        let replies = handle_text(&pos("C001", 1.0, 1.0, T0), &mut binding, &service, T0).await;
        assert_eq!(error_code(&replies[0]), "not_registered");
    }

    #[tokio::test]
    async fn pos_for_other_unit_is_identity_mismatch() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();
        let _ = handle_text(REGISTER, &mut binding, &service, T0).await;
        let replies = handle_text(&pos("C999", 1.0, 1.0, T0), &mut binding, &service, T0).await;
        assert_eq!(error_code(&replies[0]), "identity_mismatch");
    }

    #[tokio::test]
    async fn accepted_pos_has_no_direct_reply_but_is_broadcast() {
        let service = make_service(TrackingConfig::default());
        let mut rx = service.event_bus().subscribe();
        let mut binding = ConnectionBinding::new();
        let _ = handle_text(REGISTER, &mut binding, &service, T0).await;

        let replies = handle_text(&pos("C001", 1.0, 1.0, T0), &mut binding, &service, T0).await;
        assert!(replies.is_empty());
        let Ok(event) = rx.recv().await else {
            panic!("expected broadcast");
        };
        assert!(binding.matches(&event));
    }

    #[tokio::test]
    async fn rate_limited_reply_carries_retry_hint() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();
        let _ = handle_text(REGISTER, &mut binding, &service, T0).await;
        let _ = handle_text(&pos("C001", 1.0, 1.0, T0), &mut binding, &service, T0).await;

        let replies = handle_text(
            &pos("C001", 1.0, 1.0, T0 + 4_000),
            &mut binding,
            &service,
            T0 + 4_000,
        )
        .await;
        assert_eq!(
            replies[0],
            ServerMessage::Error {
                error: "rate_limited",
                retry_in_ms: Some(6_000),
            }
        );
    }

    #[tokio::test]
    async fn ping_and_garbage() {
        let service = make_service(TrackingConfig::default());
        let mut binding = ConnectionBinding::new();

        let replies = handle_text(r#"{"type":"ping"}"#, &mut binding, &service, T0).await;
        assert_eq!(replies, vec![ServerMessage::Pong { ts: T0 }]);

        let replies = handle_text("not json", &mut binding, &service, T0).await;
        assert_eq!(error_code(&replies[0]), "invalid_json");

        let replies = handle_text(r#"{"type":"warp"}"#, &mut binding, &service, T0).await;
        assert_eq!(error_code(&replies[0]), "unknown_type");
    }
}
