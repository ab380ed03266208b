//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::{EventBus, PersistQueue, RateLimiter, ReportPipeline, UnitStateStore};
use crate::persistence::PostgresPersistence;
use crate::service::TrackingService;
use crate::ws::ConnectionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Tracking service for ingestion, snapshots, and sweeps.
    pub tracking: Arc<TrackingService>,
    /// Event bus for tenant broadcasts.
    pub event_bus: EventBus,
    /// Live stream connections, probed by the heartbeat.
    pub connections: Arc<ConnectionRegistry>,
    /// Durable store for KPI queries; `None` when persistence is disabled.
    pub persistence: Option<PostgresPersistence>,
}

impl AppState {
    /// Builds the domain and service layers from configuration.
    #[must_use]
    pub fn new(config: &GatewayConfig, persistence: Option<PostgresPersistence>) -> Self {
        let store = Arc::new(UnitStateStore::new());
        let limiter = Arc::new(RateLimiter::new());
        let pipeline = ReportPipeline::new(Arc::clone(&store), limiter, config.tracking());
        let queue = Arc::new(PersistQueue::new(config.queue_capacity));
        let event_bus = EventBus::new(config.event_bus_capacity);
        let tracking = Arc::new(TrackingService::new(
            pipeline,
            store,
            queue,
            event_bus.clone(),
        ));

        Self {
            tracking,
            event_bus,
            connections: Arc::new(ConnectionRegistry::new()),
            persistence,
        }
    }
}
