//! System-state snapshot and control-decision records.
//!
//! One [`SystemState`] is assembled per control cycle from live gateway
//! reads; the hysteresis memory (`room_states`) is the only part carried
//! forward from the previous cycle. Decision records are write-only output
//! for dashboards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::Device;
use crate::decision::{Reason, Regime, Vote};
use crate::id::{CycleId, RoomId};
use crate::occupancy::OccupancyState;
use crate::time::Timestamp;

/// A dated temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasuredTemp {
    pub value: f64,
    pub at: Timestamp,
}

/// Snapshot of everything the decision engine saw this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemState {
    /// Measured temperature with freshness, `None` when the sensor gave
    /// nothing usable.
    pub measured_temps: BTreeMap<RoomId, Option<MeasuredTemp>>,
    /// Valve opening percentages per room, in valve declaration order.
    pub valve_openings: BTreeMap<RoomId, Vec<f64>>,
    pub occupancy: BTreeMap<RoomId, OccupancyState>,
    pub pump_states: BTreeMap<CycleId, bool>,
    pub boiler_state: bool,
    /// Hysteresis memory: each room's vote from the previous cycle.
    pub room_states: BTreeMap<RoomId, Vote>,
    pub last_updated: Timestamp,
}

impl SystemState {
    #[must_use]
    pub fn new(at: Timestamp) -> Self {
        Self {
            measured_temps: BTreeMap::new(),
            valve_openings: BTreeMap::new(),
            occupancy: BTreeMap::new(),
            pump_states: BTreeMap::new(),
            boiler_state: false,
            room_states: BTreeMap::new(),
            last_updated: at,
        }
    }

    /// The room's previous vote; unseen rooms read as off.
    #[must_use]
    pub fn prev_vote(&self, room: RoomId) -> Vote {
        self.room_states.get(&room).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn pump_on(&self, cycle: CycleId) -> bool {
        self.pump_states.get(&cycle).copied().unwrap_or(false)
    }

    /// Mirror an executed command into the snapshot.
    pub fn apply_device_state(&mut self, device: Device, on: bool) {
        match device {
            Device::Pump(cycle) => {
                self.pump_states.insert(cycle, on);
            }
            Device::Boiler => {
                self.boiler_state = on;
            }
        }
    }
}

/// One room's vote with its regime and reason code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomDecision {
    pub vote: Vote,
    pub regime: Regime,
    pub reason: Reason,
}

/// The full decision of one control cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlDecision {
    pub rooms: BTreeMap<RoomId, RoomDecision>,
    pub cycles: BTreeMap<CycleId, Vote>,
    pub boiler: Vote,
    /// Raised when any room's vote path failed this cycle.
    pub degraded: bool,
    pub decided_at: Timestamp,
}

impl ControlDecision {
    #[must_use]
    pub fn new(decided_at: Timestamp) -> Self {
        Self {
            rooms: BTreeMap::new(),
            cycles: BTreeMap::new(),
            boiler: Vote::Off,
            degraded: false,
            decided_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn should_default_prev_vote_to_off_for_unseen_rooms() {
        let state = SystemState::new(at());
        assert_eq!(state.prev_vote(RoomId::new(5)), Vote::Off);
    }

    #[test]
    fn should_mirror_pump_command_into_pump_states() {
        let mut state = SystemState::new(at());
        state.apply_device_state(Device::Pump(CycleId::new(2)), true);
        assert!(state.pump_on(CycleId::new(2)));
        assert!(!state.pump_on(CycleId::new(1)));
    }

    #[test]
    fn should_mirror_boiler_command_into_boiler_state() {
        let mut state = SystemState::new(at());
        state.apply_device_state(Device::Boiler, true);
        assert!(state.boiler_state);
    }

    #[test]
    fn should_roundtrip_snapshot_through_serde_json() {
        let mut state = SystemState::new(at());
        state.measured_temps.insert(
            RoomId::new(1),
            Some(MeasuredTemp {
                value: 20.4,
                at: at(),
            }),
        );
        state.measured_temps.insert(RoomId::new(2), None);
        state.room_states.insert(RoomId::new(1), Vote::On);

        let json = serde_json::to_string(&state).unwrap();
        let parsed: SystemState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.prev_vote(RoomId::new(1)), Vote::On);
        assert!(parsed.measured_temps[&RoomId::new(2)].is_none());
    }
}
