//! Time and timestamp helpers.
//!
//! Schedule grids are keyed by `(unix day, hour of day)` slots so a grid
//! spanning several days survives midnight without reindexing.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// UTC timestamp used for issuance/due/execution times, freshness checks, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// A single hour slot in a schedule grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Days since the Unix epoch.
    pub day: i64,
    /// Hour of day, `0..=23`.
    pub hour: u8,
}

impl Slot {
    /// The slot containing the given timestamp.
    #[must_use]
    pub fn of(ts: Timestamp) -> Self {
        Self {
            day: unix_day(ts),
            hour: hour_of_day(ts),
        }
    }

    /// The slot `hours` hours earlier, or `None` when that crosses the start
    /// of the day (the preheat pass never reaches into the previous day).
    #[must_use]
    pub fn back(self, hours: u8) -> Option<Self> {
        self.hour.checked_sub(hours).map(|hour| Self {
            day: self.day,
            hour,
        })
    }
}

/// Days since the Unix epoch for a timestamp.
#[must_use]
pub fn unix_day(ts: Timestamp) -> i64 {
    ts.timestamp().div_euclid(86_400)
}

/// Hour of day (`0..=23`) for a timestamp.
#[must_use]
pub fn hour_of_day(ts: Timestamp) -> u8 {
    u8::try_from(ts.hour()).unwrap_or(0)
}

/// ISO weekday (`1` = Monday .. `7` = Sunday) for a timestamp.
#[must_use]
pub fn weekday(ts: Timestamp) -> u8 {
    u8::try_from(ts.weekday().number_from_monday()).unwrap_or(1)
}
