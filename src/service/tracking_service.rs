//! Tracking service: runs the report pipeline and fans out its results.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{
    AcceptedReport, Binding, EventBus, Outcome, PendingEvent, PersistQueue, RawReport,
    ReportPipeline, StoreCounts, TenantId, TrackingConfig, TrackingEvent, UnitId, UnitState,
    UnitStateStore,
};

/// Monotonic counters exposed by the stats endpoint.
#[derive(Debug, Default)]
pub struct TrackingCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    offline_transitions: AtomicU64,
}

/// Point-in-time copy of [`TrackingCounters`] plus store and queue figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingStats {
    /// Reports committed.
    pub accepted: u64,
    /// Reports refused with an error reply.
    pub rejected: u64,
    /// Reports silently dropped as impossible jumps.
    pub dropped: u64,
    /// Units transitioned to offline by the sweep.
    pub offline_transitions: u64,
    /// Tenant and unit counts from the store.
    pub store: StoreCounts,
    /// Events waiting for the persistence writer.
    pub queue_depth: usize,
    /// Events discarded because the queue was full.
    pub queue_overflow_drops: u64,
    /// Maximum events the queue holds before dropping the oldest.
    pub queue_capacity: usize,
    /// Streams currently subscribed to the event bus.
    pub subscribers: usize,
}

/// Orchestration layer for ingestion, snapshots, and offline sweeps.
///
/// Every accepted report follows the pattern: pipeline commit → enqueue
/// for persistence → publish to the tenant's viewers, all under the unit's
/// lock. The offline sweep mutates the same store and feeds the same queue
/// and bus under the same lock.
#[derive(Debug, Clone)]
pub struct TrackingService {
    pipeline: ReportPipeline,
    store: Arc<UnitStateStore>,
    queue: Arc<PersistQueue>,
    event_bus: EventBus,
    counters: Arc<TrackingCounters>,
}

impl TrackingService {
    /// Creates a new `TrackingService`.
    #[must_use]
    pub fn new(
        pipeline: ReportPipeline,
        store: Arc<UnitStateStore>,
        queue: Arc<PersistQueue>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            pipeline,
            store,
            queue,
            event_bus,
            counters: Arc::new(TrackingCounters::default()),
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`UnitStateStore`].
    #[must_use]
    pub fn store(&self) -> &Arc<UnitStateStore> {
        &self.store
    }

    /// Returns a reference to the persistence queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<PersistQueue> {
        &self.queue
    }

    /// Returns the pipeline thresholds.
    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        self.pipeline.config()
    }

    /// Runs one report through the pipeline and applies its side effects.
    pub async fn ingest(
        &self,
        binding: Option<&Binding>,
        report: &RawReport,
        now_ms: i64,
    ) -> Outcome {
        let outcome = self
            .pipeline
            .process_with(binding, report, now_ms, |acc| self.commit_position(acc))
            .await;
        match &outcome {
            Outcome::Accepted(acc) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    tenant_id = %acc.tenant_id,
                    unit_id = %acc.unit_id,
                    status = acc.state.movement_status.as_str(),
                    streak = acc.state.moving_streak,
                    "report accepted"
                );
            }
            Outcome::Rejected(rejection) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    tenant_id = %report.tenant_id,
                    unit_id = %report.unit_id,
                    reason = rejection.code(),
                    "report rejected"
                );
            }
            Outcome::Dropped {
                distance_m,
                dt_secs,
            } => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    tenant_id = %report.tenant_id,
                    unit_id = %report.unit_id,
                    distance_m,
                    dt_secs,
                    "impossible jump dropped"
                );
            }
        }
        outcome
    }

    /// Enqueues and publishes an accepted report. Runs under the unit lock,
    /// so queue and bus order match commit order.
    async fn commit_position(&self, acc: AcceptedReport) {
        let AcceptedReport {
            tenant_id,
            unit_id,
            state,
        } = acc;
        let _ = self
            .queue
            .push(PendingEvent::Position {
                tenant_id: tenant_id.clone(),
                unit_id: unit_id.clone(),
                lat: state.lat,
                lng: state.lng,
                ts: state.ts,
                movement_status: state.movement_status,
            })
            .await;
        let _ = self.event_bus.publish(TrackingEvent::Position {
            tenant_id,
            unit_id,
            lat: state.lat,
            lng: state.lng,
            ts: state.ts,
        });
    }

    /// Returns the current state of every unit of a tenant.
    pub async fn snapshot(&self, tenant_id: &TenantId) -> Vec<(UnitId, UnitState)> {
        self.store.snapshot(tenant_id).await
    }

    /// Returns the current state of one unit.
    pub async fn unit_state(&self, tenant_id: &TenantId, unit_id: &UnitId) -> Option<UnitState> {
        self.store.get(tenant_id, unit_id).await
    }

    /// Marks every unit silent for longer than the offline TTL as offline.
    ///
    /// Each transition is published to the tenant and enqueued for
    /// persistence exactly once; tenants left without units are pruned.
    /// Returns the number of units transitioned.
    pub async fn sweep_offline(&self, now_ms: i64) -> usize {
        let ttl_ms = self.pipeline.config().offline_ttl_ms;
        let mut transitioned = 0;

        for tenant_id in self.store.tenants().await {
            for (unit_id, slot) in self.store.slots(&tenant_id).await {
                let mut guard = slot.lock().await;
                let Some(state) = guard.as_mut() else {
                    continue;
                };
                if !state.is_stale(now_ms, ttl_ms) {
                    continue;
                }
                state.mark_offline();
                // Enqueue and publish before releasing the unit so queue and
                // bus order match the unit's commit order.
                let _ = self
                    .queue
                    .push(PendingEvent::Offline {
                        tenant_id: tenant_id.clone(),
                        unit_id: unit_id.clone(),
                        ts: now_ms,
                    })
                    .await;
                let _ = self.event_bus.publish(TrackingEvent::Offline {
                    tenant_id: tenant_id.clone(),
                    unit_id: unit_id.clone(),
                    ts: now_ms,
                });
                drop(guard);
                tracing::info!(tenant_id = %tenant_id, unit_id = %unit_id, "unit offline");
                transitioned += 1;
            }

            if self.store.prune_empty_tenant(&tenant_id).await {
                tracing::debug!(tenant_id = %tenant_id, "pruned empty tenant");
            }
        }

        self.counters
            .offline_transitions
            .fetch_add(transitioned as u64, Ordering::Relaxed);
        transitioned
    }

    /// Collects counters, store counts, and queue figures.
    pub async fn stats(&self) -> TrackingStats {
        TrackingStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            offline_transitions: self.counters.offline_transitions.load(Ordering::Relaxed),
            store: self.store.counts().await,
            queue_depth: self.queue.len().await,
            queue_overflow_drops: self.queue.overflow_drops(),
            queue_capacity: self.queue.capacity(),
            subscribers: self.event_bus.receiver_count(),
        }
    }
}
