//! WebSocket layer: connection handling, identity binding, heartbeat.
//!
//! The WebSocket endpoint at `/ws` carries position reports from units and
//! live tenant-scoped broadcasts to units and viewers.

pub mod binding;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod messages;
pub mod registry;

pub use heartbeat::run_heartbeat;
pub use registry::ConnectionRegistry;
