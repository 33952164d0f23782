//! Schedule grids and the inputs they are synthesized from.
//!
//! The decision engine reads one fully resolved [`ScheduleGrid`] cell per
//! room per control cycle. Cells are typed: a numeric target or an explicit
//! `ForcedOff` marker (the legacy grids used a `-1` sentinel for the same
//! thing). The [`PresenceGrid`] keeps the intermediate presence
//! probabilities, with per-cell provenance so later passes can tell manually
//! scheduled hours from automatic ones.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::id::{CycleId, RoomId};
use crate::time::{Slot, Timestamp};

/// One resolved hour of a room's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScheduleCell {
    /// Target temperature in degrees.
    Target(f64),
    /// The room's cycle is forced off for this hour.
    ForcedOff,
}

impl ScheduleCell {
    /// The numeric target, if any.
    #[must_use]
    pub fn target(self) -> Option<f64> {
        match self {
            Self::Target(t) => Some(t),
            Self::ForcedOff => None,
        }
    }
}

/// Room × day × hour grid of resolved target temperatures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleGrid {
    cells: BTreeMap<RoomId, BTreeMap<i64, [ScheduleCell; 24]>>,
}

impl ScheduleGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn cell(&self, room: RoomId, slot: Slot) -> Option<ScheduleCell> {
        self.cells
            .get(&room)?
            .get(&slot.day)
            .map(|day| day[slot.hour as usize])
    }

    pub fn set(&mut self, room: RoomId, slot: Slot, cell: ScheduleCell) {
        let day = self
            .cells
            .entry(room)
            .or_default()
            .entry(slot.day)
            .or_insert([ScheduleCell::ForcedOff; 24]);
        day[slot.hour as usize] = cell;
    }

    /// Raise a target cell to at least `value`; forced-off cells are left
    /// alone.
    pub fn raise(&mut self, room: RoomId, slot: Slot, value: f64) {
        if let Some(ScheduleCell::Target(current)) = self.cell(room, slot) {
            if value > current {
                self.set(room, slot, ScheduleCell::Target(value));
            }
        }
    }

    /// Rooms present in the grid.
    pub fn rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.cells.keys().copied()
    }

    /// Days stored for a room.
    pub fn days(&self, room: RoomId) -> impl Iterator<Item = i64> + '_ {
        self.cells.get(&room).into_iter().flat_map(BTreeMap::keys).copied()
    }
}

/// Where a presence-grid cell got its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceSource {
    /// Blended weekly cycle and learned occupancy.
    Weekly,
    /// A manual room override.
    Override,
    /// A cycle-wide override forcing the loop off.
    CycleOff,
}

/// One hour of presence probability with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceCell {
    /// Presence probability, `0..=1`.
    pub value: f64,
    pub source: PresenceSource,
}

impl PresenceCell {
    #[must_use]
    pub fn weekly(value: f64) -> Self {
        Self {
            value,
            source: PresenceSource::Weekly,
        }
    }
}

/// Room × day × hour grid of presence probabilities with overrides applied.
///
/// Retained across schedule regenerations so the expensive blend does not
/// have to be recomputed when only the preheat inputs changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceGrid {
    cells: BTreeMap<RoomId, BTreeMap<i64, [PresenceCell; 24]>>,
}

impl PresenceGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cell(&self, room: RoomId, slot: Slot) -> Option<PresenceCell> {
        self.cells
            .get(&room)?
            .get(&slot.day)
            .map(|day| day[slot.hour as usize])
    }

    pub fn set(&mut self, room: RoomId, slot: Slot, cell: PresenceCell) {
        let day = self
            .cells
            .entry(room)
            .or_default()
            .entry(slot.day)
            .or_insert([PresenceCell::weekly(0.0); 24]);
        day[slot.hour as usize] = cell;
    }
}

/// Declared weekly presence values per room: weekday (1..=7) × hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCycle {
    values: BTreeMap<RoomId, [[f64; 24]; 7]>,
}

impl WeeklyCycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared presence value for a room at `weekday` (1..=7) and `hour`.
    /// Unknown rooms read as 0.
    #[must_use]
    pub fn value(&self, room: RoomId, weekday: u8, hour: u8) -> f64 {
        self.values
            .get(&room)
            .map_or(0.0, |week| week[(weekday as usize - 1).min(6)][hour as usize])
    }

    pub fn set(&mut self, room: RoomId, weekday: u8, hour: u8, value: f64) {
        let week = self.values.entry(room).or_insert([[0.0; 24]; 7]);
        week[(weekday as usize - 1).min(6)][hour as usize] = value;
    }

    /// Replace the whole week for a room.
    pub fn insert_room(&mut self, room: RoomId, week: [[f64; 24]; 7]) {
        self.values.insert(room, week);
    }

    /// Rooms with a declared weekly cycle.
    pub fn rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.values.keys().copied()
    }

    #[must_use]
    pub fn room_week(&self, room: RoomId) -> Option<&[[f64; 24]; 7]> {
        self.values.get(&room)
    }
}

/// Learned occupancy relative frequencies per room: weekday (1..=7) × hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyPattern {
    freq: BTreeMap<RoomId, [[f64; 24]; 7]>,
}

impl OccupancyPattern {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned relative frequency, or `None` when the room has no history.
    #[must_use]
    pub fn frequency(&self, room: RoomId, weekday: u8, hour: u8) -> Option<f64> {
        self.freq
            .get(&room)
            .map(|week| week[(weekday as usize - 1).min(6)][hour as usize])
    }

    pub fn set(&mut self, room: RoomId, weekday: u8, hour: u8, value: f64) {
        let week = self.freq.entry(room).or_insert([[0.0; 24]; 7]);
        week[(weekday as usize - 1).min(6)][hour as usize] = value;
    }
}

/// What an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum OverrideScope {
    Room(RoomId),
    Cycle(CycleId),
}

/// A manually issued, time-bounded scheduling instruction.
///
/// Room overrides force heating on or off for their window; cycle overrides
/// force the whole loop off. When several overrides overlap, the one issued
/// last wins, regardless of which window starts later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Override {
    #[serde(flatten)]
    pub scope: OverrideScope,
    pub issued_at: Timestamp,
    /// Start of the override window (hour-aligned by convention).
    pub start: Timestamp,
    pub duration_hours: u32,
    /// Ignored for cycle overrides, which always force off.
    pub heat_on: bool,
}

impl Override {
    #[must_use]
    pub fn end(&self) -> Timestamp {
        self.start + Duration::hours(i64::from(self.duration_hours))
    }

    #[must_use]
    pub fn active_at(&self, at: Timestamp) -> bool {
        self.start <= at && at < self.end()
    }
}

/// The latest-issued override active for the given predicate, if any.
pub fn winning_override<'a>(
    overrides: impl IntoIterator<Item = &'a Override>,
    at: Timestamp,
    matches: impl Fn(&Override) -> bool,
) -> Option<&'a Override> {
    overrides
        .into_iter()
        .filter(|o| o.active_at(at) && matches(o))
        .max_by_key(|o| o.issued_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(d: u32, h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn should_return_none_for_unknown_cells() {
        let grid = ScheduleGrid::new();
        assert_eq!(grid.cell(RoomId::new(1), Slot { day: 0, hour: 0 }), None);
    }

    #[test]
    fn should_store_and_read_back_cells() {
        let mut grid = ScheduleGrid::new();
        let slot = Slot { day: 19_800, hour: 7 };
        grid.set(RoomId::new(2), slot, ScheduleCell::Target(20.5));
        assert_eq!(
            grid.cell(RoomId::new(2), slot),
            Some(ScheduleCell::Target(20.5))
        );
    }

    #[test]
    fn should_raise_only_when_value_is_higher() {
        let mut grid = ScheduleGrid::new();
        let slot = Slot { day: 0, hour: 5 };
        grid.set(RoomId::new(1), slot, ScheduleCell::Target(19.0));

        grid.raise(RoomId::new(1), slot, 18.0);
        assert_eq!(grid.cell(RoomId::new(1), slot), Some(ScheduleCell::Target(19.0)));

        grid.raise(RoomId::new(1), slot, 20.0);
        assert_eq!(grid.cell(RoomId::new(1), slot), Some(ScheduleCell::Target(20.0)));
    }

    #[test]
    fn should_not_raise_forced_off_cells() {
        let mut grid = ScheduleGrid::new();
        let slot = Slot { day: 0, hour: 5 };
        grid.set(RoomId::new(1), slot, ScheduleCell::ForcedOff);
        grid.raise(RoomId::new(1), slot, 21.0);
        assert_eq!(grid.cell(RoomId::new(1), slot), Some(ScheduleCell::ForcedOff));
    }

    #[test]
    fn should_roundtrip_grid_through_serde_json() {
        let mut grid = ScheduleGrid::new();
        grid.set(RoomId::new(1), Slot { day: 3, hour: 8 }, ScheduleCell::Target(21.0));
        grid.set(RoomId::new(1), Slot { day: 3, hour: 9 }, ScheduleCell::ForcedOff);

        let json = serde_json::to_string(&grid).unwrap();
        let parsed: ScheduleGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, grid);
    }

    #[test]
    fn should_read_zero_for_unknown_weekly_cycle_room() {
        let weekly = WeeklyCycle::new();
        assert!((weekly.value(RoomId::new(9), 3, 12) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_read_back_weekly_cycle_values() {
        let mut weekly = WeeklyCycle::new();
        weekly.set(RoomId::new(1), 6, 22, 1.0);
        assert!((weekly.value(RoomId::new(1), 6, 22) - 1.0).abs() < f64::EPSILON);
        assert!((weekly.value(RoomId::new(1), 6, 21) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_distinguish_missing_pattern_from_zero_frequency() {
        let mut pattern = OccupancyPattern::new();
        pattern.set(RoomId::new(1), 1, 9, 0.0);
        assert_eq!(pattern.frequency(RoomId::new(1), 1, 9), Some(0.0));
        assert_eq!(pattern.frequency(RoomId::new(2), 1, 9), None);
    }

    #[test]
    fn should_consider_override_active_within_window_only() {
        let o = Override {
            scope: OverrideScope::Room(RoomId::new(1)),
            issued_at: ts(1, 8),
            start: ts(2, 10),
            duration_hours: 3,
            heat_on: true,
        };
        assert!(!o.active_at(ts(2, 9)));
        assert!(o.active_at(ts(2, 10)));
        assert!(o.active_at(ts(2, 12)));
        assert!(!o.active_at(ts(2, 13)));
    }

    #[test]
    fn should_pick_latest_issued_override_among_overlapping() {
        let earlier = Override {
            scope: OverrideScope::Room(RoomId::new(1)),
            issued_at: ts(1, 8),
            start: ts(2, 8),
            duration_hours: 8,
            heat_on: true,
        };
        let later = Override {
            scope: OverrideScope::Room(RoomId::new(1)),
            issued_at: ts(1, 9),
            start: ts(2, 10),
            duration_hours: 2,
            heat_on: false,
        };
        let overrides = [earlier, later];

        let winner = winning_override(&overrides, ts(2, 11), |o| {
            matches!(o.scope, OverrideScope::Room(r) if r == RoomId::new(1))
        })
        .unwrap();
        assert!(!winner.heat_on);
    }

    #[test]
    fn should_ignore_overrides_for_other_scopes() {
        let cycle_override = Override {
            scope: OverrideScope::Cycle(CycleId::new(2)),
            issued_at: ts(1, 8),
            start: ts(2, 8),
            duration_hours: 8,
            heat_on: false,
        };
        let overrides = [cycle_override];
        let winner = winning_override(&overrides, ts(2, 11), |o| {
            matches!(o.scope, OverrideScope::Room(_))
        });
        assert!(winner.is_none());
    }
}
