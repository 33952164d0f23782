//! Exponential warming curve: a room's fitted temperature rise over time.
//!
//! The curve models how quickly a room heats from `t_min * start_factor`
//! toward `t_max * end_factor` once its cycle starts:
//!
//! `T(t) = T_end + (T_start - T_end) * exp(-t / tau)`
//!
//! with `t` in minutes since heating started and `tau = a + b * external_temp`
//! (cold weather lengthens the time constant when `b < 0`). The synthesizer
//! samples the curve at hourly lead times ahead of a scheduled rise and uses
//! it to convert a comfort schedule into a boiler-start schedule.

use crate::room::WarmingParams;

/// Hours of preheat looked back from a scheduled rise.
pub const PREHEAT_LOOKBACK_HOURS: u8 = 7;

/// A warming curve sampled at hourly lead times.
#[derive(Debug, Clone)]
pub struct WarmingCurve {
    /// `samples[i]` is the curve value `i` hours after heating starts,
    /// i.e. at lead `PREHEAT_LOOKBACK_HOURS - i` before the rise.
    samples: [f64; PREHEAT_LOOKBACK_HOURS as usize + 1],
}

impl WarmingCurve {
    /// Build the curve for one room at the given external temperature.
    #[must_use]
    pub fn new(params: &WarmingParams, external_temp: f64) -> Self {
        let t_start = params.t_min * params.start_factor;
        let t_end = params.t_max * params.end_factor;
        // Guard against degenerate fits at extreme external temperatures.
        let tau = (params.a + params.b * external_temp).max(1.0);

        let mut samples = [0.0; PREHEAT_LOOKBACK_HOURS as usize + 1];
        for (i, sample) in samples.iter_mut().enumerate() {
            let minutes = (i * 60) as f64;
            let raw = t_end + (t_start - t_end) * (-minutes / tau).exp();
            *sample = raw.clamp(params.t_min, params.t_max);
        }
        Self { samples }
    }

    /// Curve value `lead` hours before the scheduled rise.
    ///
    /// Leads beyond the lookback saturate at the curve start.
    #[must_use]
    pub fn value_at_lead(&self, lead: u8) -> f64 {
        let index = PREHEAT_LOOKBACK_HOURS.saturating_sub(lead) as usize;
        self.samples[index]
    }

    /// The lead whose curve value is closest to `target`.
    ///
    /// The preheat pass aligns the curve end to the scheduled target so a
    /// moderate rise does not preheat all the way to `t_max`.
    #[must_use]
    pub fn closest_lead(&self, target: f64) -> u8 {
        let mut best = 0u8;
        let mut best_distance = f64::INFINITY;
        for lead in 0..=PREHEAT_LOOKBACK_HOURS {
            let distance = (self.value_at_lead(lead) - target).abs();
            if distance < best_distance {
                best_distance = distance;
                best = lead;
            }
        }
        best
    }
}
