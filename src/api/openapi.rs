//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    HealthResponse, KpiDailyResponse, KpiSummaryResponse, StatsResponse, TenantUnitsResponse,
    UnitStateDto,
};
use super::handlers::{kpi, system, units};
use crate::error::{ErrorBody, ErrorResponse};
use crate::persistence::models::{KpiDailyUnit, KpiSummary, OperationalStatus};

/// Generated OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "tracker-gateway",
        description = "Multi-tenant real-time geolocation ingestion and fanout."
    ),
    paths(
        system::health_handler,
        system::stats_handler,
        units::list_units,
        units::get_unit,
        kpi::kpi_summary,
        kpi::kpi_daily,
    ),
    components(schemas(
        HealthResponse,
        StatsResponse,
        TenantUnitsResponse,
        UnitStateDto,
        KpiSummaryResponse,
        KpiSummary,
        KpiDailyResponse,
        KpiDailyUnit,
        OperationalStatus,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Health and process stats"),
        (name = "Tracking", description = "Unit state and KPI queries"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_rest_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/stats",
            "/api/v1/tenants/{tenant_id}/units",
            "/api/v1/tenants/{tenant_id}/units/{unit_id}",
            "/api/v1/tenants/{tenant_id}/kpi/summary",
            "/api/v1/tenants/{tenant_id}/kpi/daily",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
