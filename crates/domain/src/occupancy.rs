//! Occupancy readings and trailing-window aggregation.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A single presence reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyState {
    Occupied,
    Clear,
    Unknown,
}

/// A dated presence sample, as logged by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySample {
    pub at: Timestamp,
    pub state: OccupancyState,
}

/// Collapse a trailing window of samples into one reading.
///
/// Any occupied sample wins; otherwise any unknown sample makes the whole
/// window unknown; an all-clear (or empty) window is clear.
#[must_use]
pub fn aggregate_window(samples: &[OccupancyState]) -> OccupancyState {
    if samples.contains(&OccupancyState::Occupied) {
        OccupancyState::Occupied
    } else if samples.contains(&OccupancyState::Unknown) {
        OccupancyState::Unknown
    } else {
        OccupancyState::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_occupied_when_any_sample_occupied() {
        let window = [
            OccupancyState::Clear,
            OccupancyState::Unknown,
            OccupancyState::Occupied,
        ];
        assert_eq!(aggregate_window(&window), OccupancyState::Occupied);
    }

    #[test]
    fn should_report_unknown_when_gaps_but_no_presence() {
        let window = [OccupancyState::Clear, OccupancyState::Unknown];
        assert_eq!(aggregate_window(&window), OccupancyState::Unknown);
    }

    #[test]
    fn should_report_clear_when_all_samples_clear() {
        let window = [OccupancyState::Clear, OccupancyState::Clear];
        assert_eq!(aggregate_window(&window), OccupancyState::Clear);
    }

    #[test]
    fn should_report_clear_for_empty_window() {
        assert_eq!(aggregate_window(&[]), OccupancyState::Clear);
    }
}
