//! Presence enforcer: patch the current hour of the schedule with live
//! occupancy.
//!
//! A trailing window of samples is collapsed per room (any occupied sample
//! wins, gaps make the window unknown). Rooms that are currently occupied
//! get the *current hour's* cell raised to their `t_max`; nothing else is
//! touched, so the patch is idempotent and safe to re-apply every cycle.

use std::collections::BTreeMap;

use chrono::Duration;

use calor_domain::error::{Phase, Severity};
use calor_domain::id::RoomId;
use calor_domain::occupancy::{OccupancyState, aggregate_window};
use calor_domain::room::Room;
use calor_domain::schedule::ScheduleGrid;
use calor_domain::time::{Slot, Timestamp};

use crate::ports::DeviceGateway;
use crate::services::reporter::ErrorSink;

/// The patched grid plus the per-room occupancy it was derived from.
#[derive(Debug, Clone)]
pub struct EnforcedSchedule {
    pub grid: ScheduleGrid,
    pub occupancy: BTreeMap<RoomId, OccupancyState>,
}

/// Apply live presence to `grid` for the hour containing `now`.
///
/// Gateway failures degrade the affected room to unknown occupancy and are
/// reported; the remaining rooms are unaffected.
pub async fn enforce<G: DeviceGateway>(
    gateway: &G,
    rooms: &[Room],
    grid: &ScheduleGrid,
    window_mins: i64,
    now: Timestamp,
    sink: &ErrorSink,
) -> EnforcedSchedule {
    let mut patched = grid.clone();
    let mut occupancy = BTreeMap::new();
    let slot = Slot::of(now);

    for room in rooms {
        let state = match &room.presence_sensor {
            Some(sensor) => {
                match gateway
                    .occupancy_window(sensor, Duration::minutes(window_mins))
                    .await
                {
                    Ok(samples) => {
                        let states: Vec<OccupancyState> =
                            samples.iter().map(|s| s.state).collect();
                        aggregate_window(&states)
                    }
                    Err(err) => {
                        sink.report(
                            Phase::AcquireState,
                            Severity::Moderate,
                            format!("occupancy window for room {}: {err}", room.id),
                        );
                        OccupancyState::Unknown
                    }
                }
            }
            None => OccupancyState::Unknown,
        };

        if state == OccupancyState::Occupied {
            patched.raise(room.id, slot, room.warming.t_max);
        }
        occupancy.insert(room.id, state);
    }

    EnforcedSchedule {
        grid: patched,
        occupancy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calor_domain::decision::ValveUpdate;
    use calor_domain::error::{CalorError, GatewayError};
    use calor_domain::id::CycleId;
    use calor_domain::occupancy::OccupancySample;
    use calor_domain::room::WarmingParams;
    use calor_domain::schedule::ScheduleCell;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::future::Future;

    use crate::ports::ClimateReading;

    fn warming() -> WarmingParams {
        WarmingParams {
            a: 120.0,
            b: -4.0,
            start_factor: 1.0,
            end_factor: 1.0,
            t_min: 17.0,
            t_max: 22.0,
        }
    }

    fn room(id: u8) -> Room {
        Room::builder()
            .id(RoomId::new(id))
            .name(format!("Room {id}"))
            .cycle(CycleId::new(1))
            .presence_sensor(format!("presence-{id}"))
            .warming(warming())
            .build()
            .unwrap()
    }

    fn at() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 40, 0).unwrap()
    }

    /// Gateway that only answers occupancy windows.
    #[derive(Default)]
    struct OccupancyGateway {
        windows: HashMap<String, Vec<OccupancySample>>,
        failing: Vec<String>,
    }

    impl DeviceGateway for OccupancyGateway {
        fn room_climate(
            &self,
            _sensor: &str,
        ) -> impl Future<Output = Result<Option<ClimateReading>, CalorError>> + Send {
            async { Ok(None) }
        }
        fn occupancy_window(
            &self,
            sensor: &str,
            _window: Duration,
        ) -> impl Future<Output = Result<Vec<OccupancySample>, CalorError>> + Send {
            let result = if self.failing.contains(&sensor.to_string()) {
                Err(GatewayError::new(sensor, "unreachable").into())
            } else {
                Ok(self.windows.get(sensor).cloned().unwrap_or_default())
            };
            async { result }
        }
        fn valve_opening(
            &self,
            _valve: &str,
        ) -> impl Future<Output = Result<Option<f64>, CalorError>> + Send {
            async { Ok(None) }
        }
        fn set_valve(
            &self,
            _valve: &str,
            _update: ValveUpdate,
        ) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
        fn pump_state(&self, _pump: &str) -> impl Future<Output = Result<bool, CalorError>> + Send {
            async { Ok(false) }
        }
        fn set_pump(
            &self,
            _pump: &str,
            _on: bool,
        ) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
        fn boiler_state(&self) -> impl Future<Output = Result<bool, CalorError>> + Send {
            async { Ok(false) }
        }
        fn set_boiler(&self, _on: bool) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
        fn external_temperature(&self) -> impl Future<Output = Result<f64, CalorError>> + Send {
            async { Ok(10.0) }
        }
    }

    fn sample(state: OccupancyState) -> OccupancySample {
        OccupancySample { at: at(), state }
    }

    fn base_grid(rooms: &[Room]) -> ScheduleGrid {
        let mut grid = ScheduleGrid::new();
        for room in rooms {
            grid.set(room.id, Slot::of(at()), ScheduleCell::Target(18.0));
        }
        grid
    }

    #[tokio::test]
    async fn should_raise_current_hour_for_occupied_room() {
        let rooms = [room(1)];
        let mut gateway = OccupancyGateway::default();
        gateway.windows.insert(
            "presence-1".to_string(),
            vec![sample(OccupancyState::Clear), sample(OccupancyState::Occupied)],
        );

        let grid = base_grid(&rooms);
        let result = enforce(
            &gateway,
            &rooms,
            &grid,
            30,
            at(),
            &ErrorSink::disconnected(),
        ).await;

        assert_eq!(
            result.grid.cell(RoomId::new(1), Slot::of(at())),
            Some(ScheduleCell::Target(22.0))
        );
        assert_eq!(result.occupancy[&RoomId::new(1)], OccupancyState::Occupied);
    }

    #[tokio::test]
    async fn should_not_touch_other_hours() {
        let rooms = [room(1)];
        let mut gateway = OccupancyGateway::default();
        gateway.windows.insert(
            "presence-1".to_string(),
            vec![sample(OccupancyState::Occupied)],
        );

        let mut grid = base_grid(&rooms);
        let other = Slot { hour: 15, ..Slot::of(at()) };
        grid.set(RoomId::new(1), other, ScheduleCell::Target(18.0));

        let result = enforce(
            &gateway,
            &rooms,
            &grid,
            30,
            at(),
            &ErrorSink::disconnected(),
        ).await;
        assert_eq!(
            result.grid.cell(RoomId::new(1), other),
            Some(ScheduleCell::Target(18.0))
        );
    }

    #[tokio::test]
    async fn should_leave_grid_unchanged_for_clear_and_unknown_rooms() {
        let rooms = [room(1), room(2)];
        let mut gateway = OccupancyGateway::default();
        gateway
            .windows
            .insert("presence-1".to_string(), vec![sample(OccupancyState::Clear)]);
        gateway.windows.insert(
            "presence-2".to_string(),
            vec![sample(OccupancyState::Unknown), sample(OccupancyState::Clear)],
        );

        let grid = base_grid(&rooms);
        let result = enforce(
            &gateway,
            &rooms,
            &grid,
            30,
            at(),
            &ErrorSink::disconnected(),
        ).await;

        assert_eq!(result.grid, grid);
        assert_eq!(result.occupancy[&RoomId::new(1)], OccupancyState::Clear);
        assert_eq!(result.occupancy[&RoomId::new(2)], OccupancyState::Unknown);
    }

    #[tokio::test]
    async fn should_degrade_failing_sensor_to_unknown_and_continue() {
        let rooms = [room(1), room(2)];
        let mut gateway = OccupancyGateway::default();
        gateway.failing.push("presence-1".to_string());
        gateway.windows.insert(
            "presence-2".to_string(),
            vec![sample(OccupancyState::Occupied)],
        );

        let grid = base_grid(&rooms);
        let result = enforce(
            &gateway,
            &rooms,
            &grid,
            30,
            at(),
            &ErrorSink::disconnected(),
        ).await;

        assert_eq!(result.occupancy[&RoomId::new(1)], OccupancyState::Unknown);
        assert_eq!(
            result.grid.cell(RoomId::new(2), Slot::of(at())),
            Some(ScheduleCell::Target(22.0))
        );
    }

    #[tokio::test]
    async fn should_be_idempotent() {
        let rooms = [room(1)];
        let mut gateway = OccupancyGateway::default();
        gateway.windows.insert(
            "presence-1".to_string(),
            vec![sample(OccupancyState::Occupied)],
        );

        let grid = base_grid(&rooms);
        let sink = ErrorSink::disconnected();
        let once = enforce(&gateway, &rooms, &grid, 30, at(), &sink).await;
        let twice = enforce(&gateway, &rooms, &once.grid, 30, at(), &sink).await;
        assert_eq!(once.grid, twice.grid);
    }

}
