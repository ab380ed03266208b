//! Periodic offline sweep.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::TrackingService;
use crate::domain::now_ms;

/// Runs [`TrackingService::sweep_offline`] every `period` until the
/// shutdown flag flips to `true`.
pub async fn run_offline_sweeper(
    service: TrackingService,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing can be stale yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let marked = service.sweep_offline(now_ms()).await;
                if marked > 0 {
                    tracing::info!(marked, "offline sweep completed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("offline sweeper stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::TrackingConfig;
    use crate::service::tracking_service::tests::{make_service, report, unit_binding};

    #[tokio::test]
    async fn sweeper_marks_stale_units_and_stops_on_shutdown() {
        let service = make_service(TrackingConfig {
            offline_ttl_ms: 0,
            ..TrackingConfig::default()
        });
        let binding = unit_binding("t1", "u1");
        let ts = now_ms() - 1_000;
        let _ = service
            .ingest(Some(&binding), &report("t1", "u1", 0.0, 0.0, ts), ts)
            .await;
        let mut rx = service.event_bus().subscribe();

        let (tx, shutdown) = watch::channel(false);
        let handle = tokio::spawn(run_offline_sweeper(
            service.clone(),
            Duration::from_millis(20),
            shutdown,
        ));

        let Ok(event) = rx.recv().await else {
            panic!("expected offline event");
        };
        assert_eq!(event.event_type_str(), "offline");

        let _ = tx.send(true);
        assert!(handle.await.is_ok());
    }
}
