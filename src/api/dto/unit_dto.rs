//! Unit state DTOs for the query endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{UnitId, UnitState};

/// Current state of one unit.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitStateDto {
    /// Unit identifier.
    #[schema(value_type = String, example = "C001")]
    pub unit_id: UnitId,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Timestamp of the last accepted report, epoch milliseconds.
    pub ts: i64,
    /// Same instant as `ts`, as RFC 3339.
    pub reported_at: Option<DateTime<Utc>>,
    /// `moving`, `stopped`, or `offline`.
    #[schema(value_type = String, example = "moving")]
    pub status: &'static str,
    /// Consecutive moving reports.
    pub moving_streak: u32,
    /// Whether the unit is marked offline.
    pub is_offline: bool,
}

impl From<(UnitId, UnitState)> for UnitStateDto {
    fn from((unit_id, state): (UnitId, UnitState)) -> Self {
        Self {
            unit_id,
            lat: state.lat,
            lng: state.lng,
            ts: state.ts,
            reported_at: DateTime::from_timestamp_millis(state.ts),
            status: state.movement_status.as_str(),
            moving_streak: state.moving_streak,
            is_offline: state.is_offline,
        }
    }
}

/// Response for `GET /api/v1/tenants/{tenantId}/units`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantUnitsResponse {
    /// Tenant described.
    pub tenant_id: String,
    /// Units, sorted by id.
    pub units: Vec<UnitStateDto>,
    /// Number of units in `units`.
    pub count: usize,
}
