//! Periodic drain of the persistence queue into an [`EventSink`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::EventSink;
use crate::domain::PersistQueue;
use crate::error::GatewayError;

/// Drains [`PersistQueue`] in bounded batches on a fixed schedule.
///
/// The batch is taken out of the queue before the sink is called, so the
/// queue lock is never held across I/O. A failed batch goes back to the
/// head of the queue; retries are bounded only by queue capacity.
#[derive(Debug)]
pub struct PersistenceWorker<S> {
    queue: Arc<PersistQueue>,
    sink: S,
    batch_size: usize,
    flush_interval: Duration,
}

impl<S: EventSink> PersistenceWorker<S> {
    /// Creates a worker over `queue` writing to `sink`.
    #[must_use]
    pub fn new(
        queue: Arc<PersistQueue>,
        sink: S,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            queue,
            sink,
            batch_size: batch_size.max(1),
            flush_interval,
        }
    }

    /// Writes one batch. Returns the number of events written.
    ///
    /// # Errors
    ///
    /// Returns the sink's error after re-queueing the batch at the head.
    pub async fn flush_once(&self) -> Result<usize, GatewayError> {
        let batch = self.queue.take_batch(self.batch_size).await;
        if batch.is_empty() {
            return Ok(0);
        }
        let size = batch.len();
        match self.sink.write_batch(&batch).await {
            Ok(()) => Ok(size),
            Err(err) => {
                let dropped = self.queue.requeue_front(batch).await;
                tracing::warn!(error = %err, size, dropped, "persistence batch failed, re-queued");
                Err(err)
            }
        }
    }

    /// Writes full batches until the queue runs short, the sink fails, or
    /// a partial batch has been written. Returns the number of events
    /// written.
    pub async fn drain(&self) -> usize {
        let mut total = 0;
        while let Ok(written) = self.flush_once().await {
            total += written;
            if written < self.batch_size {
                break;
            }
        }
        total
    }

    /// Drains every `flush_interval` until shutdown, then makes one final
    /// pass over whatever is still queued.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let written = self.drain().await;
                    if written > 0 {
                        tracing::debug!(written, "persistence batches written");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let _ = self.drain().await;
        let remaining = self.queue.len().await;
        tracing::debug!(remaining, "persistence worker stopped");
    }
}
