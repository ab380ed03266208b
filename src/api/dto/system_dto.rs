//! System endpoint DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::service::TrackingStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `true` while the process serves requests.
    pub ok: bool,
    /// Always `"healthy"`.
    #[schema(value_type = String)]
    pub status: &'static str,
    /// Crate version.
    #[schema(value_type = String)]
    pub version: &'static str,
    /// Server time, epoch milliseconds.
    pub ts: i64,
    /// Live stream connections.
    pub clients: usize,
}

/// Process-wide ingestion counters.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Live stream connections.
    pub clients: usize,
    /// Tenants holding state.
    pub tenants: usize,
    /// Units not marked offline.
    pub active_units: usize,
    /// Units marked offline.
    pub offline_units: usize,
    /// Reports committed since start.
    pub accepted: u64,
    /// Reports refused since start.
    pub rejected: u64,
    /// Impossible jumps dropped since start.
    pub dropped: u64,
    /// Offline transitions since start.
    pub offline_transitions: u64,
    /// Events waiting for the persistence writer.
    pub queue_depth: usize,
    /// Events discarded because the persistence queue was full.
    pub queue_overflow_drops: u64,
    /// Persistence queue capacity.
    pub queue_capacity: usize,
    /// Streams subscribed to tenant broadcasts.
    pub subscribers: usize,
}

impl StatsResponse {
    /// Builds the response from service stats and the live client count.
    #[must_use]
    pub fn new(stats: TrackingStats, clients: usize) -> Self {
        Self {
            clients,
            tenants: stats.store.tenants,
            active_units: stats.store.active_units,
            offline_units: stats.store.offline_units,
            accepted: stats.accepted,
            rejected: stats.rejected,
            dropped: stats.dropped,
            offline_transitions: stats.offline_transitions,
            queue_depth: stats.queue_depth,
            queue_overflow_drops: stats.queue_overflow_drops,
            queue_capacity: stats.queue_capacity,
            subscribers: stats.subscribers,
        }
    }
}
