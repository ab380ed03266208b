//! Domain layer: identities, unit state, shared stores, and the report
//! pipeline.
//!
//! This module contains the server-side model: validated tenant/unit
//! identifiers, the per-unit state store and rate limiter, the report
//! validation and classification pipeline, the tenant-scoped event bus,
//! and the bounded persistence queue.

pub mod connection_id;
pub mod event_bus;
pub mod geo;
pub mod identity;
pub mod persist_queue;
pub mod pipeline;
pub mod rate_limiter;
pub mod state_store;
pub mod tracking_event;
pub mod unit_state;

pub use connection_id::ConnectionId;
pub use event_bus::EventBus;
pub use geo::{Coordinates, distance_meters};
pub use identity::{Binding, IdentityError, TenantId, UnitId};
pub use persist_queue::{PendingEvent, PersistQueue};
pub use pipeline::{AcceptedReport, Outcome, RawReport, Rejection, ReportPipeline, TrackingConfig};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use state_store::{StoreCounts, UnitStateStore};
pub use tracking_event::TrackingEvent;
pub use unit_state::{MovementStatus, UnitState};

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
