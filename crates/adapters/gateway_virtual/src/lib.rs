//! # calor-adapter-gateway-virtual
//!
//! Virtual device gateway providing simulated sensors, valves, pumps and a
//! boiler for tests and demo runs. The real drivers (ZigBee mesh sensors,
//! smart-plug pumps, valve thermostats, the GPIO boiler relay) are external
//! collaborators; this adapter stands in for all of them behind the
//! [`DeviceGateway`] port.
//!
//! Simulated devices can be taken offline by id to exercise the engine's
//! degraded paths.
//!
//! ## Dependency rule
//!
//! Depends on `calor-app` (port traits) and `calor-domain` only.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::Duration;

use calor_app::ports::{ClimateReading, DeviceGateway};
use calor_domain::decision::ValveUpdate;
use calor_domain::error::{CalorError, GatewayError};
use calor_domain::occupancy::{OccupancySample, OccupancyState};
use calor_domain::time::{Timestamp, now};

/// A simulated radiator valve.
#[derive(Debug, Clone, Copy, Default)]
struct VirtualValve {
    opening: f64,
    setpoint: Option<f64>,
    reference: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
    climates: HashMap<String, ClimateReading>,
    presence: HashMap<String, Vec<OccupancySample>>,
    valves: HashMap<String, VirtualValve>,
    pumps: HashMap<String, bool>,
    boiler: bool,
    external_temp: f64,
    offline: HashSet<String>,
}

/// Simulated device gateway; clones share the same device state.
#[derive(Debug, Clone, Default)]
pub struct VirtualGateway {
    inner: Arc<Mutex<Inner>>,
}

impl VirtualGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a room sensor's reading, dated `at`.
    pub fn set_temperature(&self, sensor: &str, temperature: f64, at: Timestamp) {
        self.inner.lock().unwrap().climates.insert(
            sensor.to_string(),
            ClimateReading {
                temperature,
                humidity: Some(45.0),
                updated_at: at,
            },
        );
    }

    /// Append a presence sample for a presence sensor.
    pub fn record_presence(&self, sensor: &str, state: OccupancyState, at: Timestamp) {
        self.inner
            .lock()
            .unwrap()
            .presence
            .entry(sensor.to_string())
            .or_default()
            .push(OccupancySample { at, state });
    }

    /// Set a valve's reported opening percentage.
    pub fn set_valve_opening(&self, valve: &str, opening: f64) {
        self.inner
            .lock()
            .unwrap()
            .valves
            .entry(valve.to_string())
            .or_default()
            .opening = opening;
    }

    pub fn set_external_temperature(&self, temperature: f64) {
        self.inner.lock().unwrap().external_temp = temperature;
    }

    /// Make a device id fail until [`Self::bring_online`].
    pub fn take_offline(&self, device: &str) {
        self.inner.lock().unwrap().offline.insert(device.to_string());
    }

    pub fn bring_online(&self, device: &str) {
        self.inner.lock().unwrap().offline.remove(device);
    }

    /// Current pump state, for assertions.
    #[must_use]
    pub fn pump(&self, pump: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .pumps
            .get(pump)
            .copied()
            .unwrap_or(false)
    }

    /// Current boiler state, for assertions.
    #[must_use]
    pub fn boiler(&self) -> bool {
        self.inner.lock().unwrap().boiler
    }

    /// Last setpoint pushed to a valve, for assertions.
    #[must_use]
    pub fn valve_setpoint(&self, valve: &str) -> Option<f64> {
        self.inner
            .lock()
            .unwrap()
            .valves
            .get(valve)
            .and_then(|v| v.setpoint)
    }

    /// Last reference temperature pushed to a valve, for assertions.
    #[must_use]
    pub fn valve_reference(&self, valve: &str) -> Option<f64> {
        self.inner
            .lock()
            .unwrap()
            .valves
            .get(valve)
            .and_then(|v| v.reference)
    }

    fn check_online(inner: &Inner, device: &str) -> Result<(), CalorError> {
        if inner.offline.contains(device) {
            return Err(GatewayError::new(device, "simulated outage").into());
        }
        Ok(())
    }
}

impl DeviceGateway for VirtualGateway {
    fn room_climate(
        &self,
        sensor: &str,
    ) -> impl Future<Output = Result<Option<ClimateReading>, CalorError>> + Send {
        let inner = self.inner.lock().unwrap();
        let result =
            Self::check_online(&inner, sensor).map(|()| inner.climates.get(sensor).copied());
        async { result }
    }

    fn occupancy_window(
        &self,
        sensor: &str,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<OccupancySample>, CalorError>> + Send {
        let inner = self.inner.lock().unwrap();
        let result = Self::check_online(&inner, sensor).map(|()| {
            let cutoff = now() - window;
            inner
                .presence
                .get(sensor)
                .map(|samples| {
                    samples
                        .iter()
                        .filter(|s| s.at >= cutoff)
                        .copied()
                        .collect()
                })
                .unwrap_or_default()
        });
        async { result }
    }

    fn valve_opening(
        &self,
        valve: &str,
    ) -> impl Future<Output = Result<Option<f64>, CalorError>> + Send {
        let inner = self.inner.lock().unwrap();
        let result =
            Self::check_online(&inner, valve).map(|()| inner.valves.get(valve).map(|v| v.opening));
        async { result }
    }

    fn set_valve(
        &self,
        valve: &str,
        update: ValveUpdate,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let mut inner = self.inner.lock().unwrap();
        let result = Self::check_online(&inner, valve).map(|()| {
            let entry = inner.valves.entry(valve.to_string()).or_default();
            entry.setpoint = Some(update.setpoint);
            entry.reference = Some(update.measured);
        });
        async { result }
    }

    fn pump_state(&self, pump: &str) -> impl Future<Output = Result<bool, CalorError>> + Send {
        let inner = self.inner.lock().unwrap();
        let result =
            Self::check_online(&inner, pump).map(|()| inner.pumps.get(pump).copied().unwrap_or(false));
        async { result }
    }

    fn set_pump(
        &self,
        pump: &str,
        on: bool,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let mut inner = self.inner.lock().unwrap();
        let result = Self::check_online(&inner, pump).map(|()| {
            inner.pumps.insert(pump.to_string(), on);
        });
        async { result }
    }

    fn boiler_state(&self) -> impl Future<Output = Result<bool, CalorError>> + Send {
        let inner = self.inner.lock().unwrap();
        let result = Self::check_online(&inner, "boiler").map(|()| inner.boiler);
        async { result }
    }

    fn set_boiler(&self, on: bool) -> impl Future<Output = Result<(), CalorError>> + Send {
        let mut inner = self.inner.lock().unwrap();
        let result = Self::check_online(&inner, "boiler").map(|()| {
            inner.boiler = on;
        });
        async { result }
    }

    fn external_temperature(&self) -> impl Future<Output = Result<f64, CalorError>> + Send {
        let result = Ok(self.inner.lock().unwrap().external_temp);
        async { result }
    }
}
