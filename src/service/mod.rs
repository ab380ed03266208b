//! Service layer: orchestration and periodic background tasks.
//!
//! The tracking service coordinates the report pipeline, the event bus,
//! and the persistence queue. The offline sweeper runs beside it on its
//! own timer.

pub mod sweeper;
pub mod tracking_service;

pub use sweeper::run_offline_sweeper;
pub use tracking_service::{TrackingService, TrackingStats};
