//! Bounded FIFO decoupling ingestion from durable storage.
//!
//! [`PersistQueue`] never blocks producers: once full, the oldest pending
//! event is discarded to make room. A consumer takes a batch, releases the
//! lock, writes, and on failure puts the batch back at the head.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;

use super::identity::{TenantId, UnitId};
use super::unit_state::MovementStatus;

/// Element awaiting durable write. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingEvent {
    /// An accepted position report.
    Position {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Reporting unit.
        unit_id: UnitId,
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
        /// Report timestamp, epoch milliseconds.
        ts: i64,
        /// Classification at acceptance time.
        movement_status: MovementStatus,
    },
    /// A unit was marked offline by the sweep.
    Offline {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Stale unit.
        unit_id: UnitId,
        /// Sweep time, epoch milliseconds.
        ts: i64,
    },
}

/// Bounded drop-oldest queue of [`PendingEvent`]s.
#[derive(Debug)]
pub struct PersistQueue {
    items: Mutex<VecDeque<PendingEvent>>,
    capacity: usize,
    overflow_drops: AtomicU64,
}

impl PersistQueue {
    /// Creates an empty queue holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            overflow_drops: AtomicU64::new(0),
        }
    }

    /// Appends an event at the tail, dropping the oldest one if full.
    ///
    /// Returns the number of events discarded to make room (0 or 1).
    pub async fn push(&self, event: PendingEvent) -> usize {
        let mut items = self.items.lock().await;
        items.push_back(event);
        self.trim_front(&mut items)
    }

    /// Removes up to `max` events from the head.
    pub async fn take_batch(&self, max: usize) -> Vec<PendingEvent> {
        let mut items = self.items.lock().await;
        let n = max.min(items.len());
        items.drain(..n).collect()
    }

    /// Puts a failed batch back at the head, preserving its order.
    ///
    /// If that overflows the queue, the oldest events are dropped, which
    /// means the re-queued ones go first. Returns the number discarded.
    pub async fn requeue_front(&self, batch: Vec<PendingEvent>) -> usize {
        let mut items = self.items.lock().await;
        for event in batch.into_iter().rev() {
            items.push_front(event);
        }
        self.trim_front(&mut items)
    }

    /// Returns the current queue depth.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Returns `true` if no event is pending.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the total number of events discarded on overflow.
    #[must_use]
    pub fn overflow_drops(&self) -> u64 {
        self.overflow_drops.load(Ordering::Relaxed)
    }

    fn trim_front(&self, items: &mut VecDeque<PendingEvent>) -> usize {
        let excess = items.len().saturating_sub(self.capacity);
        if excess > 0 {
            items.drain(..excess);
            self.overflow_drops
                .fetch_add(excess as u64, Ordering::Relaxed);
            tracing::warn!(
                dropped = excess,
                capacity = self.capacity,
                "persistence queue full, dropped oldest events"
            );
        }
        excess
    }
}
