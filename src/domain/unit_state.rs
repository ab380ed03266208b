//! Latest accepted state of a tracked unit.

use serde::{Deserialize, Serialize};

use super::geo::Coordinates;

/// Movement classification of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    /// Moved at least the movement threshold since the previous report.
    Moving,
    /// Moved less than the movement threshold.
    Stopped,
    /// Marked stale by the offline sweep.
    Offline,
}

impl MovementStatus {
    /// Returns the wire/storage name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Moving => "moving",
            Self::Stopped => "stopped",
            Self::Offline => "offline",
        }
    }
}

/// Authoritative in-memory state of one (tenant, unit) pair.
///
/// Position, status and streak are always replaced together so readers
/// never observe a partially applied report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitState {
    /// Last accepted latitude in degrees.
    pub lat: f64,
    /// Last accepted longitude in degrees.
    pub lng: f64,
    /// Epoch milliseconds of the last accepted report.
    pub ts: i64,
    /// Current movement classification.
    pub movement_status: MovementStatus,
    /// Consecutive accepted reports classified as moving.
    pub moving_streak: u32,
    /// Set by the offline sweep, cleared by the next accepted report.
    pub is_offline: bool,
}

impl UnitState {
    /// Returns the stored position.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// Returns `true` if the state has not been refreshed for more than
    /// `ttl_ms` at `now_ms` and is not already marked offline.
    #[must_use]
    pub const fn is_stale(&self, now_ms: i64, ttl_ms: i64) -> bool {
        !self.is_offline && now_ms.saturating_sub(self.ts) > ttl_ms
    }

    /// Transitions this state to offline in place.
    pub fn mark_offline(&mut self) {
        self.is_offline = true;
        self.movement_status = MovementStatus::Offline;
    }
}
