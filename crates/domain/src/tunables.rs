//! Control tunables shared by the decision engine, synthesizer and executor.
//!
//! These map one-to-one onto the operator-editable control table; the binary
//! crate deserializes its `[control]` config section straight into this
//! struct.

use serde::{Deserialize, Serialize};

/// Operator-editable control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlTunables {
    /// Plain-hysteresis half band around the target, in degrees.
    pub hysteresis_buffer: f64,
    /// Lower bound of the dynamic valve-demand open threshold, percent.
    pub demand_hysteresis_open_min: f64,
    /// Upper bound of the dynamic valve-demand open threshold, percent.
    pub demand_hysteresis_open_max: f64,
    /// Valve-demand close threshold, percent.
    pub demand_hysteresis_close: f64,
    /// Half width of the setpoint-bias regime around the target, degrees.
    pub error_min: f64,
    /// Error at which the open threshold bottoms out, degrees.
    pub error_max: f64,
    /// Proportional gain of the valve setpoint bias.
    pub error_gain: f64,
    /// Constant offset of the valve setpoint bias, degrees.
    pub error_offset: f64,
    /// Degrees subtracted from automatically scheduled hours.
    pub no_presence_offset: f64,
    /// Trailing live-occupancy window, minutes.
    pub heating_window_mins: i64,
    /// Sensor readings older than this degrade the room to timed control.
    pub temp_data_expiry_mins: i64,
    /// Delay applied to pump-off commands, minutes.
    pub pump_off_cooldown_mins: i64,
    /// How many days of schedule to synthesize ahead.
    pub horizon_days: u32,
}

impl Default for ControlTunables {
    fn default() -> Self {
        Self {
            hysteresis_buffer: 0.5,
            demand_hysteresis_open_min: 10.0,
            demand_hysteresis_open_max: 40.0,
            demand_hysteresis_close: 5.0,
            error_min: 0.3,
            error_max: 2.0,
            error_gain: 1.5,
            error_offset: 0.5,
            no_presence_offset: 1.5,
            heating_window_mins: 30,
            temp_data_expiry_mins: 45,
            pump_off_cooldown_mins: 3,
            horizon_days: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        let parsed: ControlTunables = serde_json::from_str(r#"{"hysteresis_buffer": 0.8}"#).unwrap();
        assert!((parsed.hysteresis_buffer - 0.8).abs() < f64::EPSILON);
        assert_eq!(parsed.horizon_days, ControlTunables::default().horizon_days);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let tunables = ControlTunables::default();
        let json = serde_json::to_string(&tunables).unwrap();
        let parsed: ControlTunables = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tunables);
    }
}
