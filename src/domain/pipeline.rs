//! Per-report validation and movement classification.
//!
//! [`ReportPipeline::process`] runs the gates in a fixed order: identity,
//! field validation, coordinate normalization, rate limiting, the
//! impossible-jump filter, movement classification, streak accumulation,
//! and finally the commit to the [`UnitStateStore`]. Jump detection,
//! classification, commit and the caller's commit hook all run under the
//! unit's lock, so each report is judged against whatever state was
//! committed before it and its side effects are ordered the same way.

use std::future::Future;
use std::sync::Arc;

use super::geo::{Coordinates, distance_meters};
use super::identity::{Binding, TenantId, UnitId};
use super::rate_limiter::{RateDecision, RateLimiter};
use super::state_store::UnitStateStore;
use super::unit_state::{MovementStatus, UnitState};

/// Thresholds driving the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingConfig {
    /// Minimum spacing between accepted reports of one unit.
    pub min_report_interval_ms: i64,
    /// A unit silent for longer than this is marked offline.
    pub offline_ttl_ms: i64,
    /// Minimum displacement classified as movement.
    pub moving_threshold_m: f64,
    /// Displacement beyond which a quick report is an impossible jump.
    pub jump_distance_m: f64,
    /// Time window within which the jump distance applies.
    pub jump_window_secs: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_report_interval_ms: 10_000,
            offline_ttl_ms: 180_000,
            moving_threshold_m: 10.0,
            jump_distance_m: 300.0,
            jump_window_secs: 20.0,
        }
    }
}

/// Position report as it arrived on the wire, before validation.
///
/// Fields that were missing or did not parse as numbers are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReport {
    /// Tenant the sender claims.
    pub tenant_id: String,
    /// Unit the sender claims.
    pub unit_id: String,
    /// Latitude, degrees or micro-degrees.
    pub lat: Option<f64>,
    /// Longitude, degrees or micro-degrees.
    pub lng: Option<f64>,
    /// Device timestamp in epoch milliseconds; arrival time when absent.
    pub ts: Option<f64>,
}

/// Client-visible reason a report was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The connection has not registered.
    NotRegistered,
    /// The report names a different identity than the bound one.
    IdentityMismatch,
    /// Ids empty or coordinates/timestamp not finite numbers.
    BadPayload,
    /// The report came sooner than the minimum interval.
    RateLimited {
        /// Advisory wait before retrying.
        retry_in_ms: u64,
    },
}

impl Rejection {
    /// Returns the wire error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::IdentityMismatch => "identity_mismatch",
            Self::BadPayload => "bad_pos_payload",
            Self::RateLimited { .. } => "rate_limited",
        }
    }

    /// Returns the advisory retry delay, if any.
    #[must_use]
    pub const fn retry_in_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_in_ms } => Some(*retry_in_ms),
            _ => None,
        }
    }
}

/// A report that passed every gate and was committed.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedReport {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Reporting unit.
    pub unit_id: UnitId,
    /// The state now stored for the unit.
    pub state: UnitState,
}

/// Result of running a report through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Committed; fan out and persist.
    Accepted(AcceptedReport),
    /// Refused; tell the sender.
    Rejected(Rejection),
    /// Ignored as an impossible jump; tell nobody.
    Dropped {
        /// Distance from the stored position, meters.
        distance_m: f64,
        /// Seconds since the stored report.
        dt_secs: f64,
    },
}

/// Stateless driver over the shared store and rate limiter.
#[derive(Debug, Clone)]
pub struct ReportPipeline {
    store: Arc<UnitStateStore>,
    limiter: Arc<RateLimiter>,
    config: TrackingConfig,
}

impl ReportPipeline {
    /// Creates a pipeline over shared state.
    #[must_use]
    pub fn new(
        store: Arc<UnitStateStore>,
        limiter: Arc<RateLimiter>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            store,
            limiter,
            config,
        }
    }

    /// Returns the active thresholds.
    #[must_use]
    pub const fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Evaluates one report from a connection bound to `binding`.
    ///
    /// `now_ms` stands in for a missing report timestamp.
    pub async fn process(
        &self,
        binding: Option<&Binding>,
        report: &RawReport,
        now_ms: i64,
    ) -> Outcome {
        self.process_with(binding, report, now_ms, |_| async {}).await
    }

    /// Like [`Self::process`], but awaits `on_commit` with the accepted
    /// report before the unit lock is released.
    pub async fn process_with<F, Fut>(
        &self,
        binding: Option<&Binding>,
        report: &RawReport,
        now_ms: i64,
        on_commit: F,
    ) -> Outcome
    where
        F: FnOnce(AcceptedReport) -> Fut,
        Fut: Future<Output = ()>,
    {
        let Some(binding) = binding else {
            return Outcome::Rejected(Rejection::NotRegistered);
        };
        let Binding::Unit {
            tenant_id: bound_tenant,
            unit_id: bound_unit,
        } = binding
        else {
            return Outcome::Rejected(Rejection::IdentityMismatch);
        };
        if report.tenant_id.trim() != bound_tenant.as_str()
            || report.unit_id.trim() != bound_unit.as_str()
        {
            return Outcome::Rejected(Rejection::IdentityMismatch);
        }

        let (Ok(tenant_id), Ok(unit_id)) = (
            TenantId::parse(&report.tenant_id),
            UnitId::parse(&report.unit_id),
        ) else {
            return Outcome::Rejected(Rejection::BadPayload);
        };
        let (Some(lat), Some(lng)) = (report.lat, report.lng) else {
            return Outcome::Rejected(Rejection::BadPayload);
        };
        if !lat.is_finite() || !lng.is_finite() {
            return Outcome::Rejected(Rejection::BadPayload);
        }
        let ts = match report.ts {
            None => now_ms,
            Some(raw) if raw.is_finite() => raw as i64,
            Some(_) => return Outcome::Rejected(Rejection::BadPayload),
        };

        let position = Coordinates::new(lat, lng).normalized();

        if let RateDecision::Limited { retry_in_ms } = self
            .limiter
            .try_accept(&tenant_id, &unit_id, ts, self.config.min_report_interval_ms)
            .await
        {
            return Outcome::Rejected(Rejection::RateLimited { retry_in_ms });
        }

        let slot = self.store.slot(&tenant_id, &unit_id).await;
        let mut guard = slot.lock().await;
        let previous = *guard;

        if let Some(prev) = previous {
            let dt_secs = ts.saturating_sub(prev.ts) as f64 / 1000.0;
            if dt_secs > 0.0 {
                let distance_m = distance_meters(prev.coordinates(), position);
                if distance_m > self.config.jump_distance_m
                    && dt_secs <= self.config.jump_window_secs
                {
                    // The rate limiter keeps this timestamp even though the
                    // position is discarded.
                    return Outcome::Dropped {
                        distance_m,
                        dt_secs,
                    };
                }
            }
        }

        let state = self.classify(previous, position, ts);
        *guard = Some(state);
        let accepted = AcceptedReport {
            tenant_id,
            unit_id,
            state,
        };
        on_commit(accepted.clone()).await;
        drop(guard);

        Outcome::Accepted(accepted)
    }

    /// Computes the next state from the previous one and a new position.
    fn classify(&self, previous: Option<UnitState>, position: Coordinates, ts: i64) -> UnitState {
        let (movement_status, moving_streak) = match previous {
            None => (MovementStatus::Stopped, 0),
            Some(prev) => {
                let distance = distance_meters(prev.coordinates(), position);
                if distance >= self.config.moving_threshold_m {
                    let streak = if prev.movement_status == MovementStatus::Moving {
                        prev.moving_streak.saturating_add(1)
                    } else {
                        1
                    };
                    (MovementStatus::Moving, streak)
                } else {
                    (MovementStatus::Stopped, 0)
                }
            }
        };

        UnitState {
            lat: position.lat,
            lng: position.lng,
            ts,
            movement_status,
            moving_streak,
            is_offline: false,
        }
    }
}
