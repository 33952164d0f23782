//! Device gateway port: every sensor read and device write the engine needs.
//!
//! The physical drivers (mesh-sensor gateway, smart-plug pumps, valve
//! thermostats, the GPIO boiler relay, the outdoor temperature source) live
//! behind this trait. Calls are logically synchronous: a failed write
//! surfaces as an error and is not retried within the same control cycle;
//! the next cycle's re-attempt is the retry policy.

use std::future::Future;

use chrono::Duration;

use calor_domain::decision::ValveUpdate;
use calor_domain::error::CalorError;
use calor_domain::occupancy::OccupancySample;
use calor_domain::time::Timestamp;

/// A dated temperature/humidity reading from a room sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percent, when the sensor reports it.
    pub humidity: Option<f64>,
    pub updated_at: Timestamp,
}

/// Outbound port to the device drivers.
pub trait DeviceGateway {
    /// Latest climate reading of a room sensor, `None` when the sensor has
    /// never reported.
    fn room_climate(
        &self,
        sensor: &str,
    ) -> impl Future<Output = Result<Option<ClimateReading>, CalorError>> + Send;

    /// Presence samples of the trailing `window` for a presence sensor.
    fn occupancy_window(
        &self,
        sensor: &str,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<OccupancySample>, CalorError>> + Send;

    /// Reported opening percentage of a valve, `None` when unreachable.
    fn valve_opening(
        &self,
        valve: &str,
    ) -> impl Future<Output = Result<Option<f64>, CalorError>> + Send;

    /// Push a setpoint and reference temperature to a valve.
    fn set_valve(
        &self,
        valve: &str,
        update: ValveUpdate,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;

    /// Current on/off state of a circulation pump plug.
    fn pump_state(&self, pump: &str) -> impl Future<Output = Result<bool, CalorError>> + Send;

    /// Switch a circulation pump plug.
    fn set_pump(
        &self,
        pump: &str,
        on: bool,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;

    /// Current state of the boiler relay.
    fn boiler_state(&self) -> impl Future<Output = Result<bool, CalorError>> + Send;

    /// Switch the boiler relay.
    fn set_boiler(&self, on: bool) -> impl Future<Output = Result<(), CalorError>> + Send;

    /// Outdoor temperature used by the warming model.
    fn external_temperature(&self) -> impl Future<Output = Result<f64, CalorError>> + Send;
}
