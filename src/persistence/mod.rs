//! Persistence layer: durable sink for pending events and its drain worker.
//!
//! [`EventSink`] is the contract with the durable store: a batch is either
//! applied as a whole or reported as failed as a whole. The concrete
//! PostgreSQL implementation uses `sqlx::PgPool`; [`LogSink`] stands in
//! when persistence is disabled.

pub mod models;
pub mod postgres;
pub mod worker;

use std::future::Future;

use crate::domain::PendingEvent;
use crate::error::GatewayError;

pub use postgres::PostgresPersistence;
pub use worker::PersistenceWorker;

/// Durable destination for batches of [`PendingEvent`]s.
pub trait EventSink: Send + Sync + 'static {
    /// Applies the whole batch or fails for the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the batch could not be
    /// applied; nothing from it may be visible afterwards.
    fn write_batch(
        &self,
        batch: &[PendingEvent],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Sink that only logs batch sizes. Used when persistence is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    async fn write_batch(&self, batch: &[PendingEvent]) -> Result<(), GatewayError> {
        let offline = batch
            .iter()
            .filter(|e| matches!(e, PendingEvent::Offline { .. }))
            .count();
        tracing::debug!(
            size = batch.len(),
            positions = batch.len() - offline,
            offline,
            "persistence disabled, batch discarded"
        );
        Ok(())
    }
}
