//! Stream message types: inbound frames and outbound replies.
//!
//! Inbound frames are JSON objects discriminated by `type`. Field parsing
//! is lenient (numbers may arrive as strings); strict validation happens
//! in the report pipeline so refusals carry the right reason.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{RawReport, Rejection, UnitId, UnitState};

/// Role requested by a `register` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A reporting unit (default).
    Unit,
    /// A tenant-wide live viewer.
    Viewer,
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `{type:"register", tenantId, unitId, role?}`.
    Register {
        /// Raw tenant id, not yet validated.
        tenant_id: String,
        /// Raw unit id, not yet validated.
        unit_id: String,
        /// Requested role.
        role: Role,
    },
    /// `{type:"pos", tenantId, unitId, lat, lng, ts?}`.
    Position(RawReport),
    /// `{type:"ping"}`.
    Ping,
}

/// Frame-level failure, reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not JSON, or not a JSON object.
    InvalidJson,
    /// A JSON object with an unrecognized `type`.
    UnknownType,
    /// `register` without usable ids.
    BadRegisterPayload,
    /// `register` for a different identity on a bound connection.
    AlreadyRegistered,
}

impl ProtocolError {
    /// Returns the wire error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::UnknownType => "unknown_type",
            Self::BadRegisterPayload => "bad_register_payload",
            Self::AlreadyRegistered => "already_registered",
        }
    }
}

/// One unit inside a `snapshot` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotUnit {
    /// Unit identifier.
    pub unit_id: UnitId,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Last accepted report, epoch milliseconds.
    pub ts: i64,
    /// Movement status name.
    pub status: &'static str,
    /// Whether the unit is marked offline.
    pub is_offline: bool,
}

impl From<(UnitId, UnitState)> for SnapshotUnit {
    fn from((unit_id, state): (UnitId, UnitState)) -> Self {
        Self {
            unit_id,
            lat: state.lat,
            lng: state.lng,
            ts: state.ts,
            status: state.movement_status.as_str(),
            is_offline: state.is_offline,
        }
    }
}

/// Frames the server sends in reply to a client.
///
/// Broadcasts (`pos`, `offline`) are serialized straight from
/// [`crate::domain::TrackingEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Identity bound.
    Registered {
        /// Bound tenant.
        tenant_id: String,
        /// Bound unit; absent for viewers.
        #[serde(skip_serializing_if = "Option::is_none")]
        unit_id: Option<String>,
        /// `"unit"` or `"viewer"`.
        role: &'static str,
        /// Server time, epoch milliseconds.
        ts: i64,
    },
    /// Current state of every unit of the tenant, sent once at bind time.
    Snapshot {
        /// Tenant described.
        tenant_id: String,
        /// Units, sorted by id.
        units: Vec<SnapshotUnit>,
        /// Server time, epoch milliseconds.
        ts: i64,
    },
    /// Reply to `ping`.
    Pong {
        /// Server time, epoch milliseconds.
        ts: i64,
    },
    /// Something went wrong with the client's frame.
    Error {
        /// Error code.
        error: &'static str,
        /// Advisory retry delay for `rate_limited`.
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_in_ms: Option<u64>,
    },
}

impl ServerMessage {
    /// Builds an error reply for a frame-level failure.
    #[must_use]
    pub const fn protocol_error(err: ProtocolError) -> Self {
        Self::Error {
            error: err.code(),
            retry_in_ms: None,
        }
    }

    /// Builds an error reply for a refused report.
    #[must_use]
    pub const fn rejection(rejection: Rejection) -> Self {
        Self::Error {
            error: rejection.code(),
            retry_in_ms: rejection.retry_in_ms(),
        }
    }
}

/// Decodes one text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidJson`] for anything that is not a JSON
/// object and [`ProtocolError::UnknownType`] for unrecognized types.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) else {
        return Err(ProtocolError::InvalidJson);
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("register") => Ok(ClientMessage::Register {
            tenant_id: string_field(&obj, "tenantId"),
            unit_id: string_field(&obj, "unitId"),
            role: match obj.get("role").and_then(Value::as_str) {
                Some("viewer") => Role::Viewer,
                _ => Role::Unit,
            },
        }),
        Some("pos") => Ok(ClientMessage::Position(RawReport {
            tenant_id: string_field(&obj, "tenantId"),
            unit_id: string_field(&obj, "unitId"),
            lat: number_field(&obj, "lat"),
            lng: number_field(&obj, "lng"),
            ts: match obj.get("ts") {
                None | Some(Value::Null) => None,
                Some(_) => Some(number_field(&obj, "ts").unwrap_or(f64::NAN)),
            },
        })),
        Some("ping") => Ok(ClientMessage::Ping),
        _ => Err(ProtocolError::UnknownType),
    }
}

/// Reads an identifier that may arrive as a string or a number.
fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Reads a number that may arrive as a JSON number or a numeric string.
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_invalid_json() {
        assert_eq!(parse_client_message("{nope"), Err(ProtocolError::InvalidJson));
        assert_eq!(parse_client_message("[1,2]"), Err(ProtocolError::InvalidJson));
        assert_eq!(parse_client_message("42"), Err(ProtocolError::InvalidJson));
    }

    #[test]
    fn unknown_or_missing_type() {
        assert_eq!(
            parse_client_message(r#"{"type":"teleport"}"#),
            Err(ProtocolError::UnknownType)
        );
        assert_eq!(parse_client_message("{}"), Err(ProtocolError::UnknownType));
    }

    #[test]
    fn register_defaults_to_unit_role() {
        let msg = parse_client_message(r#"{"type":"register","tenantId":"t1","unitId":7}"#);
        assert_eq!(
            msg,
            Ok(ClientMessage::Register {
                tenant_id: "t1".to_string(),
                unit_id: "7".to_string(),
                role: Role::Unit,
            })
        );
    }

    #[test]
    fn register_as_viewer() {
        let Ok(ClientMessage::Register { role, unit_id, .. }) =
            parse_client_message(r#"{"type":"register","tenantId":"t1","role":"viewer"}"#)
        else {
            panic!("expected register");
        };
        assert_eq!(role, Role::Viewer);
        assert!(unit_id.is_empty());
    }

    #[test]
    fn pos_accepts_numeric_strings() {
        let Ok(ClientMessage::Position(report)) = parse_client_message(
            r#"{"type":"pos","tenantId":"t1","unitId":"C001","lat":"-34.6","lng":-58.38}"#,
        ) else {
            panic!("expected pos");
        };
        assert_eq!(report.lat, Some(-34.6));
        assert_eq!(report.lng, Some(-58.38));
        assert_eq!(report.ts, None);
    }

    #[test]
    fn pos_with_garbage_timestamp_is_not_finite() {
        let Ok(ClientMessage::Position(report)) = parse_client_message(
            r#"{"type":"pos","tenantId":"t1","unitId":"u","lat":1,"lng":2,"ts":"soon"}"#,
        ) else {
            panic!("expected pos");
        };
        assert!(report.ts.is_some_and(|ts| ts.is_nan()));
    }

    #[test]
    fn pos_with_missing_coordinates() {
        let Ok(ClientMessage::Position(report)) =
            parse_client_message(r#"{"type":"pos","tenantId":"t1","unitId":"u","lat":true}"#)
        else {
            panic!("expected pos");
        };
        assert_eq!(report.lat, None);
        assert_eq!(report.lng, None);
    }

    #[test]
    fn error_reply_shapes() {
        let limited = ServerMessage::rejection(Rejection::RateLimited { retry_in_ms: 1500 });
        let Ok(value) = serde_json::to_value(&limited) else {
            panic!("serialization failed");
        };
        assert_eq!(
            value,
            serde_json::json!({"type": "error", "error": "rate_limited", "retryInMs": 1500})
        );

        let invalid = ServerMessage::protocol_error(ProtocolError::InvalidJson);
        let Ok(value) = serde_json::to_value(&invalid) else {
            panic!("serialization failed");
        };
        assert_eq!(value, serde_json::json!({"type": "error", "error": "invalid_json"}));
    }

    #[test]
    fn registered_uses_camel_case() {
        let msg = ServerMessage::Registered {
            tenant_id: "t1".to_string(),
            unit_id: Some("u1".to_string()),
            role: "unit",
            ts: 9,
        };
        let json = serde_json::to_string(&msg).unwrap_or_default();
        assert!(json.contains("\"type\":\"registered\""));
        assert!(json.contains("\"tenantId\":\"t1\""));
        assert!(json.contains("\"unitId\":\"u1\""));
    }
}
