//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::EventSink;
use super::models::{KpiDailyRow, KpiDailyUnit, KpiSummary};
use crate::config::GatewayConfig;
use crate::domain::PendingEvent;
use crate::error::GatewayError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
///
/// Tables (see `migrations/`):
/// - `geo_units_last`: one row per (tenant, unit), upserted.
/// - `geo_units_history`: append-only position log.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool sized from the gateway configuration and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Aggregates online/offline/moving/stopped counts for a tenant.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn kpi_summary(&self, tenant_id: &str) -> Result<KpiSummary, GatewayError> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            "SELECT \
                COUNT(*), \
                COUNT(*) FILTER (WHERE NOT is_offline), \
                COUNT(*) FILTER (WHERE is_offline), \
                COUNT(*) FILTER (WHERE status = 'moving'), \
                COUNT(*) FILTER (WHERE status = 'stopped') \
             FROM geo_units_last WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(KpiSummary::from(row))
    }

    /// Per-unit activity for the current UTC day, one entry per unit in
    /// the latest-state table, ordered by unit id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn kpi_daily(&self, tenant_id: &str) -> Result<Vec<KpiDailyUnit>, GatewayError> {
        let rows = sqlx::query_as::<_, KpiDailyRow>(
            "SELECT                 u.unit_id, u.status, u.is_offline,                 COUNT(h.id), MIN(h.server_ts), MAX(h.server_ts),                 (SELECT MAX(a.server_ts) FROM geo_units_history a                   WHERE a.tenant_id = u.tenant_id AND a.unit_id = u.unit_id),                 (SELECT COUNT(*) FROM (                     SELECT r.status FROM geo_units_history r                      WHERE r.tenant_id = u.tenant_id AND r.unit_id = u.unit_id                      ORDER BY r.server_ts DESC, r.id DESC LIMIT 3                  ) recent WHERE recent.status = 'moving')              FROM geo_units_last u              LEFT JOIN geo_units_history h                ON h.tenant_id = u.tenant_id AND h.unit_id = u.unit_id               AND h.server_ts >= date_trunc('day', now() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'              WHERE u.tenant_id = $1              GROUP BY u.tenant_id, u.unit_id, u.status, u.is_offline              ORDER BY u.unit_id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        Ok(rows
            .into_iter()
            .map(|row| KpiDailyUnit::from_row(row, now))
            .collect())
    }
}

impl EventSink for PostgresPersistence {
    async fn write_batch(&self, batch: &[PendingEvent]) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;

        for event in batch {
            match event {
                PendingEvent::Position {
                    tenant_id,
                    unit_id,
                    lat,
                    lng,
                    ts,
                    movement_status,
                } => {
                    let reported_at = to_timestamp(*ts);
                    sqlx::query(
                        "INSERT INTO geo_units_last \
                            (tenant_id, unit_id, lat, lng, status, is_offline, reported_at, server_ts) \
                         VALUES ($1, $2, $3, $4, $5, FALSE, $6, now()) \
                         ON CONFLICT (tenant_id, unit_id) DO UPDATE SET \
                            lat = EXCLUDED.lat, lng = EXCLUDED.lng, status = EXCLUDED.status, \
                            is_offline = FALSE, reported_at = EXCLUDED.reported_at, \
                            server_ts = EXCLUDED.server_ts",
                    )
                    .bind(tenant_id.as_str())
                    .bind(unit_id.as_str())
                    .bind(*lat)
                    .bind(*lng)
                    .bind(movement_status.as_str())
                    .bind(reported_at)
                    .execute(&mut *tx)
                    .await?;

                    sqlx::query(
                        "INSERT INTO geo_units_history \
                            (tenant_id, unit_id, lat, lng, status, reported_at) \
                         VALUES ($1, $2, $3, $4, $5, $6)",
                    )
                    .bind(tenant_id.as_str())
                    .bind(unit_id.as_str())
                    .bind(*lat)
                    .bind(*lng)
                    .bind(movement_status.as_str())
                    .bind(reported_at)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingEvent::Offline {
                    tenant_id, unit_id, ..
                } => {
                    sqlx::query(
                        "UPDATE geo_units_last SET is_offline = TRUE, status = 'offline' \
                         WHERE tenant_id = $1 AND unit_id = $2",
                    )
                    .bind(tenant_id.as_str())
                    .bind(unit_id.as_str())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Converts epoch milliseconds to a UTC timestamp, falling back to now for
/// values outside chrono's range.
fn to_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_else(|| {
        tracing::warn!(ts, "report timestamp out of range, storing server time");
        Utc::now()
    })
}
