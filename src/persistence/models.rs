//! Database row models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Consecutive moving reports that make movement sustained.
pub const SUSTAINED_MOVING_REPORTS: i64 = 3;

/// Minutes of silence still considered on time.
pub const ON_TIME_MINUTES: i64 = 10;

/// Minutes of silence still considered delayed rather than not reporting.
pub const DELAYED_MINUTES: i64 = 30;

/// Per-tenant aggregate over the latest-state table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KpiSummary {
    /// Units with a latest-state row.
    pub total_units: i64,
    /// Units not marked offline.
    pub online: i64,
    /// Units marked offline.
    pub offline: i64,
    /// Units whose last status is `moving`.
    pub moving: i64,
    /// Units whose last status is `stopped`.
    pub stopped: i64,
}

impl From<(i64, i64, i64, i64, i64)> for KpiSummary {
    fn from((total_units, online, offline, moving, stopped): (i64, i64, i64, i64, i64)) -> Self {
        Self {
            total_units,
            online,
            offline,
            moving,
            stopped,
        }
    }
}

/// Operational reading of a unit's day, derived from durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    /// Marked offline by the sweep.
    Offline,
    /// No position ever persisted.
    NoData,
    /// The last three persisted reports were all moving.
    SustainedMoving,
    /// Last report moving, but not sustained.
    OccasionalMoving,
    /// Reported today, last report stopped.
    NotMoving,
    /// Last signal within [`ON_TIME_MINUTES`].
    Ok,
    /// Last signal within [`DELAYED_MINUTES`].
    Delayed,
    /// Silent for longer than [`DELAYED_MINUTES`].
    NotReporting,
}

impl OperationalStatus {
    /// Classifies a unit. The first matching rule wins, in declaration
    /// order of the variants.
    #[must_use]
    pub fn classify(
        is_offline: bool,
        minutes_since_last_signal: Option<i64>,
        events_today: i64,
        status: &str,
        recent_moving: i64,
    ) -> Self {
        if is_offline {
            return Self::Offline;
        }
        let Some(minutes) = minutes_since_last_signal else {
            return Self::NoData;
        };
        if recent_moving >= SUSTAINED_MOVING_REPORTS {
            Self::SustainedMoving
        } else if status == "moving" {
            Self::OccasionalMoving
        } else if events_today > 0 && status == "stopped" {
            Self::NotMoving
        } else if minutes <= ON_TIME_MINUTES {
            Self::Ok
        } else if minutes <= DELAYED_MINUTES {
            Self::Delayed
        } else {
            Self::NotReporting
        }
    }
}

/// Row shape of the daily KPI query: unit id, last status, offline flag,
/// events today, first and last signal today, last signal ever, and moving
/// reports among the last three.
pub type KpiDailyRow = (
    String,
    String,
    bool,
    i64,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    i64,
);

/// One unit's activity for the current day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KpiDailyUnit {
    /// Unit identifier.
    pub unit_id: String,
    /// At least one position persisted today.
    pub present_today: bool,
    /// Positions persisted today.
    pub events_today: i64,
    /// Whole minutes since the last persisted position.
    pub minutes_since_last_signal: Option<i64>,
    /// First position persisted today.
    pub day_start: Option<DateTime<Utc>>,
    /// Last position persisted today.
    pub day_end: Option<DateTime<Utc>>,
    /// Last status in the latest-state table.
    pub status: String,
    /// Offline flag in the latest-state table.
    pub is_offline: bool,
    /// Derived operational status.
    pub operational_status: OperationalStatus,
}

impl KpiDailyUnit {
    /// Builds a unit entry from a query row, measuring silence against `now`.
    #[must_use]
    pub fn from_row(row: KpiDailyRow, now: DateTime<Utc>) -> Self {
        let (unit_id, status, is_offline, events_today, day_start, day_end, last_signal, recent) =
            row;
        let minutes_since_last_signal = last_signal.map(|at| (now - at).num_minutes());
        let operational_status = OperationalStatus::classify(
            is_offline,
            minutes_since_last_signal,
            events_today,
            &status,
            recent,
        );
        Self {
            unit_id,
            present_today: events_today > 0,
            events_today,
            minutes_since_last_signal,
            day_start,
            day_end,
            status,
            is_offline,
            operational_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn offline_and_missing_data_win_first() {
        assert_eq!(
            OperationalStatus::classify(true, Some(0), 5, "moving", 3),
            OperationalStatus::Offline
        );
        assert_eq!(
            OperationalStatus::classify(false, None, 0, "stopped", 0),
            OperationalStatus::NoData
        );
    }

    #[test]
    fn movement_rules() {
        assert_eq!(
            OperationalStatus::classify(false, Some(50), 3, "moving", 3),
            OperationalStatus::SustainedMoving
        );
        assert_eq!(
            OperationalStatus::classify(false, Some(50), 2, "moving", 2),
            OperationalStatus::OccasionalMoving
        );
        assert_eq!(
            OperationalStatus::classify(false, Some(50), 1, "stopped", 0),
            OperationalStatus::NotMoving
        );
    }

    #[test]
    fn silence_thresholds_without_reports_today() {
        let at = |minutes| OperationalStatus::classify(false, Some(minutes), 0, "stopped", 0);
        assert_eq!(at(10), OperationalStatus::Ok);
        assert_eq!(at(11), OperationalStatus::Delayed);
        assert_eq!(at(30), OperationalStatus::Delayed);
        assert_eq!(at(31), OperationalStatus::NotReporting);
    }

    #[test]
    fn from_row_measures_silence_and_presence() {
        let now = Utc::now();
        let last = now - TimeDelta::minutes(12) - TimeDelta::seconds(30);
        let unit = KpiDailyUnit::from_row(
            (
                "C001".to_string(),
                "stopped".to_string(),
                false,
                0,
                None,
                None,
                Some(last),
                0,
            ),
            now,
        );
        assert!(!unit.present_today);
        assert_eq!(unit.minutes_since_last_signal, Some(12));
        assert_eq!(unit.operational_status, OperationalStatus::Delayed);
    }
}
