//! REST endpoint handlers organized by resource.

pub mod kpi;
pub mod system;
pub mod units;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(system::stats_handler))
        .merge(units::routes())
        .merge(kpi::routes())
}
