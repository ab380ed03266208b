//! Unit state queries: tenant snapshot and single unit.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{TenantUnitsResponse, UnitStateDto};
use crate::app_state::AppState;
use crate::domain::{TenantId, UnitId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /tenants/{tenant_id}/units`: Current state of every unit.
///
/// # Errors
///
/// Returns [`GatewayError::TenantNotFound`] if the tenant holds no state.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/units",
    tag = "Tracking",
    summary = "Tenant snapshot",
    description = "Returns the in-memory state of every unit of the tenant, sorted by unit id.",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Tenant snapshot", body = TenantUnitsResponse),
        (status = 400, description = "Blank tenant id", body = ErrorResponse),
        (status = 404, description = "No state for tenant", body = ErrorResponse),
    )
)]
pub async fn list_units(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<TenantUnitsResponse>, GatewayError> {
    let tenant = TenantId::parse(&tenant_id)?;
    let units = state.tracking.snapshot(&tenant).await;
    if units.is_empty() {
        return Err(GatewayError::TenantNotFound(tenant.to_string()));
    }

    let units: Vec<UnitStateDto> = units.into_iter().map(UnitStateDto::from).collect();
    Ok(Json(TenantUnitsResponse {
        tenant_id: tenant.to_string(),
        count: units.len(),
        units,
    }))
}

/// `GET /tenants/{tenant_id}/units/{unit_id}`: Current state of one unit.
///
/// # Errors
///
/// Returns [`GatewayError::UnitNotFound`] if the unit holds no state.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/units/{unit_id}",
    tag = "Tracking",
    summary = "Unit state",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier"),
        ("unit_id" = String, Path, description = "Unit identifier"),
    ),
    responses(
        (status = 200, description = "Unit state", body = UnitStateDto),
        (status = 400, description = "Blank identifier", body = ErrorResponse),
        (status = 404, description = "No state for unit", body = ErrorResponse),
    )
)]
pub async fn get_unit(
    State(state): State<AppState>,
    Path((tenant_id, unit_id)): Path<(String, String)>,
) -> Result<Json<UnitStateDto>, GatewayError> {
    let tenant = TenantId::parse(&tenant_id)?;
    let unit = UnitId::parse(&unit_id)?;
    let Some(unit_state) = state.tracking.unit_state(&tenant, &unit).await else {
        return Err(GatewayError::UnitNotFound {
            tenant_id: tenant.to_string(),
            unit_id: unit.to_string(),
        });
    };
    Ok(Json(UnitStateDto::from((unit, unit_state))))
}

/// Unit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{tenant_id}/units", get(list_units))
        .route("/tenants/{tenant_id}/units/{unit_id}", get(get_unit))
}
