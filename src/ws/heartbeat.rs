//! Periodic liveness probe over all live connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::registry::ConnectionRegistry;

/// Probes every registered connection each `period` until shutdown.
///
/// A connection that has not answered the previous probe by the next pass
/// is terminated, so a dead peer is dropped within two periods.
pub async fn run_heartbeat(
    registry: Arc<ConnectionRegistry>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = registry.probe_all().await;
                if summary.terminated > 0 {
                    tracing::info!(
                        terminated = summary.terminated,
                        pinged = summary.pinged,
                        "heartbeat terminated unresponsive connections"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("heartbeat stopped");
}
