//! Broadcast channel for tracking events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Accepted
//! reports and offline transitions are published once; every stream
//! connection holds its own receiver and filters by tenant.

use tokio::sync::broadcast;

use super::TrackingEvent;

/// Broadcast bus for [`TrackingEvent`]s.
///
/// Backed by a `tokio::broadcast` ring (default capacity 10 000). Publishing
/// never waits on receivers: a slow connection lags and skips events
/// instead of holding up the others.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TrackingEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: TrackingEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    ///
    /// Each stream connection calls this once on connect.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{TenantId, UnitId};

    fn make_event(tenant: &str) -> TrackingEvent {
        let (Ok(tenant_id), Ok(unit_id)) = (TenantId::parse(tenant), UnitId::parse("u1")) else {
            panic!("valid ids");
        };
        TrackingEvent::Offline {
            tenant_id,
            unit_id,
            ts: 1,
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(make_event("t1")), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(make_event("t1")), 2);

        let (Ok(e1), Ok(e2)) = (rx1.recv().await, rx2.recv().await) else {
            panic!("both receivers should get the event");
        };
        assert_eq!(e1, e2);
        assert_eq!(e1.tenant_id().as_str(), "t1");
    }

    #[tokio::test]
    async fn slow_receiver_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();
        for _ in 0..5 {
            let _ = bus.publish(make_event("t1"));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(16);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);
        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
