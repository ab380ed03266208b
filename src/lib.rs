//! # tracker-gateway
//!
//! Multi-tenant real-time geolocation gateway.
//!
//! Field units stream position reports over WebSocket. Each report is
//! validated, rate limited, screened for impossible jumps, classified as
//! moving or stopped, and committed to in-memory per-unit state. Accepted
//! positions are broadcast to every connection of the same tenant and
//! queued for batched persistence. A periodic sweep marks silent units
//! offline.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket units/viewers, HTTP)
//!     │
//!     ├── WS Handler (ws/)         ── heartbeat, binding, replies
//!     ├── REST Handlers (api/)     ── health, stats, snapshots, KPIs
//!     │
//!     ├── TrackingService (service/) ── offline sweeper
//!     │
//!     ├── ReportPipeline, UnitStateStore, RateLimiter (domain/)
//!     ├── EventBus (domain/)       ── tenant-filtered fanout
//!     ├── PersistQueue (domain/)   ── bounded, drop-oldest
//!     │
//!     └── PersistenceWorker → PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod server;
pub mod service;
pub mod ws;
