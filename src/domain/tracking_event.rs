//! Tenant-scoped events fanned out to live connections.
//!
//! Every accepted report and every offline transition emits a
//! [`TrackingEvent`] through the [`super::EventBus`]. The serialized form
//! is the exact frame pushed to stream clients.

use serde::Serialize;

use super::identity::{TenantId, UnitId};

/// Event broadcast to every connection bound to the same tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum TrackingEvent {
    /// A position report passed every pipeline gate.
    #[serde(rename = "pos")]
    Position {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Reporting unit.
        unit_id: UnitId,
        /// Accepted latitude (normalized).
        lat: f64,
        /// Accepted longitude (normalized).
        lng: f64,
        /// Report timestamp, epoch milliseconds.
        ts: i64,
    },

    /// A unit stopped reporting and was marked offline.
    #[serde(rename = "offline")]
    Offline {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Stale unit.
        unit_id: UnitId,
        /// Sweep time, epoch milliseconds.
        ts: i64,
    },
}

impl TrackingEvent {
    /// Returns the tenant this event is scoped to.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            Self::Position { tenant_id, .. } | Self::Offline { tenant_id, .. } => tenant_id,
        }
    }

    /// Returns the unit this event concerns.
    #[must_use]
    pub fn unit_id(&self) -> &UnitId {
        match self {
            Self::Position { unit_id, .. } | Self::Offline { unit_id, .. } => unit_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Position { .. } => "pos",
            Self::Offline { .. } => "offline",
        }
    }
}
