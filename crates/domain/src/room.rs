//! Room: a heated space with sensors, optional radiator valves and fitted
//! warming parameters.
//!
//! Rooms are loaded from configuration and immutable during a run. Everything
//! the decision engine and the schedule synthesizer need to know about a room
//! lives here: which cycle feeds it, which sensor reports its temperature,
//! which valves it can address, and the thermal response model fitted from
//! recorded warm-up data.

use serde::{Deserialize, Serialize};

use crate::error::{CalorError, ValidationError};
use crate::id::{CycleId, RoomId};

/// Fitted thermal-response parameters for one room.
///
/// The warming time constant is `tau(minutes) = a + b * external_temp`; the
/// curve runs from `t_min * start_factor` toward `t_max * end_factor` and all
/// scheduled targets are clamped into `[t_min, t_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmingParams {
    pub a: f64,
    pub b: f64,
    pub start_factor: f64,
    pub end_factor: f64,
    pub t_min: f64,
    pub t_max: f64,
}

impl WarmingParams {
    /// Check that the temperature band is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvertedTemperatureBand`] when
    /// `t_min >= t_max`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.t_min >= self.t_max {
            return Err(ValidationError::InvertedTemperatureBand {
                t_min: self.t_min,
                t_max: self.t_max,
            });
        }
        Ok(())
    }
}

/// A heated room under control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub cycle: CycleId,
    /// Mesh sensor id reporting temperature/humidity, if any.
    pub sensor: Option<String>,
    /// Addressable valve/thermostat ids; empty for plain-hysteresis rooms.
    pub valves: Vec<String>,
    /// Presence sensor id, if the room is occupancy-scheduled.
    pub presence_sensor: Option<String>,
    /// Whether the controller votes for this room at all.
    pub controlled: bool,
    pub warming: WarmingParams,
    /// Blend weight between the declared weekly cycle and learned occupancy.
    pub weekly_cycle_weight: f64,
    /// Learned-frequency divisor for the presence blend.
    pub in_threshold: f64,
    /// Stale-data fallback threshold: scheduled targets above this count as
    /// "timed on".
    pub threshold_temp: f64,
}

impl Room {
    /// Create a builder for constructing a [`Room`].
    #[must_use]
    pub fn builder() -> RoomBuilder {
        RoomBuilder::default()
    }

    /// Whether the room has addressable valves for demand control.
    #[must_use]
    pub fn has_valves(&self) -> bool {
        !self.valves.is_empty()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CalorError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - the temperature band is inverted
    /// - `weekly_cycle_weight` is outside `0..=1`
    /// - `in_threshold` is not positive
    pub fn validate(&self) -> Result<(), CalorError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.warming.validate()?;
        if !(0.0..=1.0).contains(&self.weekly_cycle_weight) {
            return Err(ValidationError::WeightOutOfRange(self.weekly_cycle_weight).into());
        }
        if self.in_threshold <= 0.0 {
            return Err(ValidationError::NonPositiveThreshold(self.in_threshold).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Room`].
#[derive(Debug)]
pub struct RoomBuilder {
    id: Option<RoomId>,
    name: Option<String>,
    cycle: Option<CycleId>,
    sensor: Option<String>,
    valves: Vec<String>,
    presence_sensor: Option<String>,
    controlled: bool,
    warming: Option<WarmingParams>,
    weekly_cycle_weight: f64,
    in_threshold: f64,
    threshold_temp: f64,
}

impl Default for RoomBuilder {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            cycle: None,
            sensor: None,
            valves: Vec::new(),
            presence_sensor: None,
            controlled: true,
            warming: None,
            weekly_cycle_weight: 1.0,
            in_threshold: 0.5,
            threshold_temp: 19.0,
        }
    }
}

impl RoomBuilder {
    #[must_use]
    pub fn id(mut self, id: RoomId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn cycle(mut self, cycle: CycleId) -> Self {
        self.cycle = Some(cycle);
        self
    }

    #[must_use]
    pub fn sensor(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = Some(sensor.into());
        self
    }

    #[must_use]
    pub fn valve(mut self, valve: impl Into<String>) -> Self {
        self.valves.push(valve.into());
        self
    }

    #[must_use]
    pub fn presence_sensor(mut self, sensor: impl Into<String>) -> Self {
        self.presence_sensor = Some(sensor.into());
        self
    }

    #[must_use]
    pub fn controlled(mut self, controlled: bool) -> Self {
        self.controlled = controlled;
        self
    }

    #[must_use]
    pub fn warming(mut self, warming: WarmingParams) -> Self {
        self.warming = Some(warming);
        self
    }

    #[must_use]
    pub fn weekly_cycle_weight(mut self, weight: f64) -> Self {
        self.weekly_cycle_weight = weight;
        self
    }

    #[must_use]
    pub fn in_threshold(mut self, threshold: f64) -> Self {
        self.in_threshold = threshold;
        self
    }

    #[must_use]
    pub fn threshold_temp(mut self, temp: f64) -> Self {
        self.threshold_temp = temp;
        self
    }

    /// Consume the builder, validate, and return a [`Room`].
    ///
    /// # Errors
    ///
    /// Returns [`CalorError::Validation`] if required fields are missing or
    /// invariants fail.
    pub fn build(self) -> Result<Room, CalorError> {
        let room = Room {
            id: self.id.unwrap_or(RoomId::new(0)),
            name: self.name.unwrap_or_default(),
            cycle: self.cycle.unwrap_or(CycleId::new(0)),
            sensor: self.sensor,
            valves: self.valves,
            presence_sensor: self.presence_sensor,
            controlled: self.controlled,
            warming: self.warming.unwrap_or(DEFAULT_WARMING),
            weekly_cycle_weight: self.weekly_cycle_weight,
            in_threshold: self.in_threshold,
            threshold_temp: self.threshold_temp,
        };
        room.validate()?;
        Ok(room)
    }
}

/// Conservative defaults for rooms without fitted parameters.
const DEFAULT_WARMING: WarmingParams = WarmingParams {
    a: 60.0,
    b: -2.0,
    start_factor: 1.0,
    end_factor: 1.0,
    t_min: 17.0,
    t_max: 22.0,
};
