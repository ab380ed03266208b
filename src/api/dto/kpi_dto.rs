//! KPI DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::models::{KpiDailyUnit, KpiSummary};

/// Response for `GET /api/v1/tenants/{tenantId}/kpi/summary`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummaryResponse {
    /// Tenant described.
    pub tenant_id: String,
    /// Aggregates over the durable latest-state table.
    pub summary: KpiSummary,
}

/// Response for `GET /api/v1/tenants/{tenantId}/kpi/daily`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiDailyResponse {
    /// Tenant described.
    pub tenant_id: String,
    /// Today's activity for every unit with durable state.
    pub units: Vec<KpiDailyUnit>,
}
