//! Per-unit minimum inter-report spacing.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::identity::{TenantId, UnitId};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The report may proceed; its timestamp is now the last accepted one.
    Accepted,
    /// The report came too soon.
    Limited {
        /// Advisory wait before the next report would be accepted.
        retry_in_ms: u64,
    },
}

/// Tracks the last accepted report timestamp of every (tenant, unit).
///
/// Independent from the state store: classification never reads it.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_accepted: Mutex<HashMap<TenantId, HashMap<UnitId, i64>>>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `ts` if at least `min_interval_ms` has passed since the
    /// unit's last accepted timestamp. The first report of a unit is always
    /// accepted, whatever its timestamp.
    ///
    /// Records `ts` on acceptance. A rejection leaves stored state as is.
    pub async fn try_accept(
        &self,
        tenant_id: &TenantId,
        unit_id: &UnitId,
        ts: i64,
        min_interval_ms: i64,
    ) -> RateDecision {
        let mut map = self.last_accepted.lock().await;
        let last = map
            .get(tenant_id)
            .and_then(|units| units.get(unit_id))
            .copied();

        if let Some(last) = last {
            let elapsed = ts.saturating_sub(last);
            if elapsed < min_interval_ms {
                let wait = min_interval_ms.saturating_sub(elapsed);
                return RateDecision::Limited {
                    retry_in_ms: u64::try_from(wait).unwrap_or(u64::MAX),
                };
            }
        }

        map.entry(tenant_id.clone())
            .or_default()
            .insert(unit_id.clone(), ts);
        RateDecision::Accepted
    }

    /// Returns the last accepted timestamp of a unit, if any.
    #[cfg(test)]
    pub(crate) async fn last_accepted(&self, tenant_id: &TenantId, unit_id: &UnitId) -> Option<i64> {
        let map = self.last_accepted.lock().await;
        map.get(tenant_id)
            .and_then(|units| units.get(unit_id))
            .copied()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const MIN: i64 = 10_000;

    fn ids() -> (TenantId, UnitId) {
        let (Ok(t), Ok(u)) = (TenantId::parse("t1"), UnitId::parse("u1")) else {
            panic!("valid ids");
        };
        (t, u)
    }

    #[tokio::test]
    async fn first_report_is_accepted() {
        let limiter = RateLimiter::new();
        let (t, u) = ids();
        let decision = limiter.try_accept(&t, &u, 1_700_000_000_000, MIN).await;
        assert_eq!(decision, RateDecision::Accepted);
        assert_eq!(limiter.last_accepted(&t, &u).await, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn too_soon_is_limited_with_remaining_wait() {
        let limiter = RateLimiter::new();
        let (t, u) = ids();
        let _ = limiter.try_accept(&t, &u, 100_000, MIN).await;
        let decision = limiter.try_accept(&t, &u, 103_000, MIN).await;
        assert_eq!(decision, RateDecision::Limited { retry_in_ms: 7_000 });
        assert_eq!(limiter.last_accepted(&t, &u).await, Some(100_000));
    }

    #[tokio::test]
    async fn exactly_min_interval_is_accepted() {
        let limiter = RateLimiter::new();
        let (t, u) = ids();
        let _ = limiter.try_accept(&t, &u, 100_000, MIN).await;
        let decision = limiter.try_accept(&t, &u, 110_000, MIN).await;
        assert_eq!(decision, RateDecision::Accepted);
    }

    #[tokio::test]
    async fn units_are_independent() {
        let limiter = RateLimiter::new();
        let (t, u1) = ids();
        let Ok(u2) = UnitId::parse("u2") else {
            panic!("valid unit");
        };
        let _ = limiter.try_accept(&t, &u1, 100_000, MIN).await;
        assert_eq!(
            limiter.try_accept(&t, &u2, 100_001, MIN).await,
            RateDecision::Accepted
        );
    }

    #[tokio::test]
    async fn first_report_with_tiny_or_negative_timestamp_is_accepted() {
        let limiter = RateLimiter::new();
        let (t, u) = ids();
        assert_eq!(
            limiter.try_accept(&t, &u, 5_000, MIN).await,
            RateDecision::Accepted
        );
        assert_eq!(limiter.last_accepted(&t, &u).await, Some(5_000));

        let Ok(other) = UnitId::parse("u2") else {
            panic!("valid unit");
        };
        assert_eq!(
            limiter.try_accept(&t, &other, -1, MIN).await,
            RateDecision::Accepted
        );
        // spacing applies from the second report on
        assert_eq!(
            limiter.try_accept(&t, &other, 4_999, MIN).await,
            RateDecision::Limited { retry_in_ms: 5_000 }
        );
    }
}
