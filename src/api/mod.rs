//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Query endpoints are mounted under `/api/v1`; `/health` sits at the root.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

pub use openapi::ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::domain::{Binding, RawReport, TenantId, UnitId, now_ms};

    fn state() -> AppState {
        AppState::new(&GatewayConfig::default(), None)
    }

    async fn seed(state: &AppState, tenant: &str, unit: &str) {
        let (Ok(tenant_id), Ok(unit_id)) = (TenantId::parse(tenant), UnitId::parse(unit)) else {
            panic!("valid ids");
        };
        let binding = Binding::Unit { tenant_id, unit_id };
        let now = now_ms();
        let report = RawReport {
            tenant_id: tenant.to_string(),
            unit_id: unit.to_string(),
            lat: Some(-34.6037),
            lng: Some(-58.3816),
            ts: Some(now as f64),
        };
        let _ = state.tracking.ingest(Some(&binding), &report, now).await;
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("valid request");
        };
        let Ok(response) = build_router().with_state(state).oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("readable body");
        };
        let Ok(json) = serde_json::from_slice(&bytes) else {
            panic!("json body");
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok_and_clients() {
        let (status, body) = get(state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], Value::Bool(true));
        assert_eq!(body["clients"], 0);
    }

    #[tokio::test]
    async fn tenant_units_lists_snapshot() {
        let state = state();
        seed(&state, "pyme_demo", "C002").await;
        seed(&state, "pyme_demo", "C001").await;
        seed(&state, "other", "X").await;

        let (status, body) = get(state, "/api/v1/tenants/pyme_demo/units").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["units"][0]["unitId"], "C001");
        assert_eq!(body["units"][0]["status"], "stopped");
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let (status, body) = get(state(), "/api/v1/tenants/nobody/units").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test]
    async fn single_unit_and_missing_unit() {
        let state = state();
        seed(&state, "pyme_demo", "C001").await;

        let (status, body) = get(state.clone(), "/api/v1/tenants/pyme_demo/units/C001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isOffline"], Value::Bool(false));

        let (status, body) = get(state, "/api/v1/tenants/pyme_demo/units/C404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2002);
    }

    #[tokio::test]
    async fn stats_count_accepted_reports() {
        let state = state();
        seed(&state, "pyme_demo", "C001").await;
        let (status, body) = get(state, "/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["activeUnits"], 1);
        assert_eq!(body["queueDepth"], 1);
        assert_eq!(body["queueCapacity"], 5_000);
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn kpi_without_persistence_is_unavailable() {
        let (status, body) = get(state(), "/api/v1/tenants/pyme_demo/kpi/summary").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 3002);
    }

    #[tokio::test]
    async fn kpi_daily_without_persistence_is_unavailable() {
        let (status, body) = get(state(), "/api/v1/tenants/pyme_demo/kpi/daily").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 3002);
    }

    #[tokio::test]
    async fn kpi_daily_blank_tenant_is_bad_request() {
        let (status, body) = get(state(), "/api/v1/tenants/%20/kpi/daily").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);
    }
}
