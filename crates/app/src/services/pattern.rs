//! Occupancy pattern builder: learned presence statistics per weekday/hour.
//!
//! Folds a trailing presence log (28 days at 5-minute sampling by default)
//! into rolling relative frequencies: for each day in the window, the share
//! of occupied samples per hour, then the mean of those shares across days
//! falling on the same weekday. Hours with no usable data read as 0.

use std::collections::BTreeMap;

use chrono::Duration;

use calor_domain::id::RoomId;
use calor_domain::occupancy::{OccupancySample, OccupancyState};
use calor_domain::schedule::OccupancyPattern;
use calor_domain::time::{Timestamp, hour_of_day, unix_day, weekday};

/// Builder configuration; the default window matches the presence logger.
#[derive(Debug, Clone, Copy)]
pub struct PatternBuilder {
    pub window_days: i64,
}

impl Default for PatternBuilder {
    fn default() -> Self {
        Self { window_days: 28 }
    }
}

impl PatternBuilder {
    /// Compute the pattern from per-room sample logs, considering only
    /// samples inside the trailing window ending at `now`.
    #[must_use]
    pub fn build(
        &self,
        logs: &BTreeMap<RoomId, Vec<OccupancySample>>,
        now: Timestamp,
    ) -> OccupancyPattern {
        let window_start = now - Duration::days(self.window_days);
        let mut pattern = OccupancyPattern::new();

        for (&room, samples) in logs {
            // (day, hour) -> (occupied count, total count)
            let mut per_hour: BTreeMap<(i64, u8), (u32, u32)> = BTreeMap::new();
            for sample in samples {
                if sample.at < window_start || sample.at > now {
                    continue;
                }
                let key = (unix_day(sample.at), hour_of_day(sample.at));
                let entry = per_hour.entry(key).or_insert((0, 0));
                entry.1 += 1;
                if sample.state == OccupancyState::Occupied {
                    entry.0 += 1;
                }
            }

            // (weekday, hour) -> daily relative frequencies
            let mut per_slot: BTreeMap<(u8, u8), Vec<f64>> = BTreeMap::new();
            for (&(day, hour), &(occupied, total)) in &per_hour {
                if total == 0 {
                    continue;
                }
                // Midday of the unix day is safely inside it.
                let midday = chrono::DateTime::from_timestamp(day * 86_400 + 43_200, 0)
                    .unwrap_or_default();
                per_slot
                    .entry((weekday(midday), hour))
                    .or_default()
                    .push(f64::from(occupied) / f64::from(total));
            }

            for ((wd, hour), freqs) in per_slot {
                let mean = freqs.iter().sum::<f64>() / freqs.len() as f64;
                pattern.set(room, wd, hour, mean);
            }
        }

        pattern
    }
}
