//! KPI aggregates served from the durable store.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{KpiDailyResponse, KpiSummaryResponse};
use crate::app_state::AppState;
use crate::domain::TenantId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /tenants/{tenant_id}/kpi/summary`: Online/offline/moving/stopped counts.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceDisabled`] when no database is
/// configured, or [`GatewayError::PersistenceError`] on query failure.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/kpi/summary",
    tag = "Tracking",
    summary = "Tenant KPI summary",
    description = "Aggregates the durable latest-state table for the tenant.",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "KPI summary", body = KpiSummaryResponse),
        (status = 400, description = "Blank tenant id", body = ErrorResponse),
        (status = 503, description = "Persistence disabled", body = ErrorResponse),
    )
)]
pub async fn kpi_summary(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<KpiSummaryResponse>, GatewayError> {
    let tenant = TenantId::parse(&tenant_id)?;
    let Some(persistence) = state.persistence.as_ref() else {
        return Err(GatewayError::PersistenceDisabled);
    };
    let summary = persistence.kpi_summary(tenant.as_str()).await?;
    Ok(Json(KpiSummaryResponse {
        tenant_id: tenant.to_string(),
        summary,
    }))
}

/// `GET /tenants/{tenant_id}/kpi/daily`: Per-unit activity for the current day.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceDisabled`] when no database is
/// configured, or [`GatewayError::PersistenceError`] on query failure.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/kpi/daily",
    tag = "Tracking",
    summary = "Tenant daily KPI",
    description = "Presence, event count, silence and operational status per unit for the current UTC day.",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Daily KPI", body = KpiDailyResponse),
        (status = 400, description = "Blank tenant id", body = ErrorResponse),
        (status = 503, description = "Persistence disabled", body = ErrorResponse),
    )
)]
pub async fn kpi_daily(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<KpiDailyResponse>, GatewayError> {
    let tenant = TenantId::parse(&tenant_id)?;
    let Some(persistence) = state.persistence.as_ref() else {
        return Err(GatewayError::PersistenceDisabled);
    };
    let units = persistence.kpi_daily(tenant.as_str()).await?;
    Ok(Json(KpiDailyResponse {
        tenant_id: tenant.to_string(),
        units,
    }))
}

/// KPI routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{tenant_id}/kpi/summary", get(kpi_summary))
        .route("/tenants/{tenant_id}/kpi/daily", get(kpi_daily))
}
