//! Schedule synthesis: from weekly cycles, learned occupancy, overrides and
//! warming curves to the resolved target-temperature grid.
//!
//! The pipeline per room and hour:
//!
//! 1. presence = `clamp01(w * weekly + (1 - w) * floor(learned / in_threshold))`
//! 2. manual overrides overwrite presence (latest issuance wins; cycle
//!    overrides force the whole loop off)
//! 3. temperature = `t_min + presence * (t_max - t_min)`
//! 4. preheat: walk back from each hour along the room's warming curve and
//!    raise earlier hours so the room reaches its target on time
//! 5. subtract the no-presence offset from automatically scheduled hours and
//!    round to 0.1 degrees
//!
//! [`ScheduleService`] caches the result; regeneration happens when the
//! sync watcher flagged the inputs stale or the calendar day changed.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use calor_domain::error::{Phase, Severity};
use calor_domain::room::Room;
use calor_domain::schedule::{
    OccupancyPattern, Override, OverrideScope, PresenceCell, PresenceGrid, PresenceSource,
    ScheduleCell, ScheduleGrid, WeeklyCycle, winning_override,
};
use calor_domain::time::{Slot, Timestamp, unix_day, weekday};
use calor_domain::tunables::ControlTunables;
use calor_domain::warming::{PREHEAT_LOOKBACK_HOURS, WarmingCurve};

use crate::ports::ScheduleStore;
use crate::services::reporter::ErrorSink;

/// Everything one synthesis run reads.
#[derive(Debug, Clone)]
pub struct SynthesisInputs<'a> {
    pub rooms: &'a [Room],
    pub weekly: &'a WeeklyCycle,
    pub pattern: &'a OccupancyPattern,
    pub overrides: &'a [Override],
    pub external_temp: f64,
    pub tunables: &'a ControlTunables,
}

/// Build the schedule and presence grids for `horizon_days` starting at
/// `now`'s day.
#[must_use]
pub fn synthesize(inputs: &SynthesisInputs<'_>, now: Timestamp) -> (ScheduleGrid, PresenceGrid) {
    let mut presence = PresenceGrid::new();
    let mut schedule = ScheduleGrid::new();

    for day_offset in 0..inputs.tunables.horizon_days {
        for hour in 0..24u8 {
            // Evaluate overrides at half past, well inside the hour.
            let timepoint = hour_timepoint(now, day_offset, hour);
            let slot = Slot::of(timepoint);
            let wd = weekday(timepoint);

            for room in inputs.rooms {
                let cell = presence_for(inputs, room, wd, hour, timepoint);
                presence.set(room.id, slot, cell);

                let schedule_cell = match cell.source {
                    PresenceSource::CycleOff => ScheduleCell::ForcedOff,
                    PresenceSource::Weekly | PresenceSource::Override => {
                        let band = room.warming.t_max - room.warming.t_min;
                        ScheduleCell::Target(room.warming.t_min + cell.value * band)
                    }
                };
                schedule.set(room.id, slot, schedule_cell);
            }
        }
    }

    for room in inputs.rooms {
        preheat_room(&mut schedule, room, inputs.external_temp, now, inputs.tunables);
        finalize_room(&mut schedule, &presence, room, now, inputs.tunables);
    }

    (schedule, presence)
}

fn hour_timepoint(now: Timestamp, day_offset: u32, hour: u8) -> Timestamp {
    let day = now + chrono::Duration::days(i64::from(day_offset));
    day.date_naive()
        .and_hms_opt(u32::from(hour), 30, 0)
        .unwrap_or_default()
        .and_utc()
}

/// Steps 1 and 2: blended presence with overrides applied.
fn presence_for(
    inputs: &SynthesisInputs<'_>,
    room: &Room,
    wd: u8,
    hour: u8,
    timepoint: Timestamp,
) -> PresenceCell {
    let weekly_value = inputs.weekly.value(room.id, wd, hour);
    let value = match inputs.pattern.frequency(room.id, wd, hour) {
        Some(freq) => {
            let learned = (freq / room.in_threshold).floor();
            let w = room.weekly_cycle_weight;
            (w * weekly_value + (1.0 - w) * learned).clamp(0.0, 1.0)
        }
        // No recorded history for the room: the declared cycle stands alone.
        None => weekly_value.clamp(0.0, 1.0),
    };
    let mut cell = PresenceCell::weekly(value);

    let room_override = winning_override(inputs.overrides, timepoint, |o| {
        matches!(o.scope, OverrideScope::Room(r) if r == room.id)
    });
    if let Some(o) = room_override {
        cell = PresenceCell {
            value: if o.heat_on { 1.0 } else { 0.0 },
            source: PresenceSource::Override,
        };
    }

    let cycle_override = winning_override(inputs.overrides, timepoint, |o| {
        matches!(o.scope, OverrideScope::Cycle(c) if c == room.cycle)
    });
    if cycle_override.is_some() {
        cell = PresenceCell {
            value: 0.0,
            source: PresenceSource::CycleOff,
        };
    }

    cell
}

/// Step 4: align the warming curve to each hour's target and raise the
/// preceding hours to the curve, within the same day.
fn preheat_room(
    schedule: &mut ScheduleGrid,
    room: &Room,
    external_temp: f64,
    now: Timestamp,
    tunables: &ControlTunables,
) {
    let curve = WarmingCurve::new(&room.warming, external_temp);

    for day_offset in 0..tunables.horizon_days {
        for hour in 0..24u8 {
            let slot = Slot::of(hour_timepoint(now, day_offset, hour));
            let Some(ScheduleCell::Target(target)) = schedule.cell(room.id, slot) else {
                continue;
            };
            let closest = curve.closest_lead(target);
            for back in 1..=(PREHEAT_LOOKBACK_HOURS - closest) {
                let Some(prev) = slot.back(back) else { break };
                schedule.raise(room.id, prev, curve.value_at_lead(closest + back));
            }
        }
    }
}

/// Step 5: no-presence offset and rounding.
fn finalize_room(
    schedule: &mut ScheduleGrid,
    presence: &PresenceGrid,
    room: &Room,
    now: Timestamp,
    tunables: &ControlTunables,
) {
    for day_offset in 0..tunables.horizon_days {
        for hour in 0..24u8 {
            let slot = Slot::of(hour_timepoint(now, day_offset, hour));
            let Some(ScheduleCell::Target(target)) = schedule.cell(room.id, slot) else {
                continue;
            };
            let automatic = room.presence_sensor.is_some()
                && presence
                    .cell(room.id, slot)
                    .is_some_and(|c| c.source == PresenceSource::Weekly);
            let offset = if automatic {
                tunables.no_presence_offset
            } else {
                0.0
            };
            let value = (target - offset).clamp(room.warming.t_min, room.warming.t_max);
            let rounded = (value * 10.0).round() / 10.0;
            schedule.set(room.id, slot, ScheduleCell::Target(rounded));
        }
    }
}

struct Cached {
    schedule: ScheduleGrid,
    generated_day: i64,
}

/// Caching wrapper around [`synthesize`] with stale-flag invalidation.
pub struct ScheduleService<S> {
    store: S,
    sink: ErrorSink,
    cache: Mutex<Option<Cached>>,
    stale: AtomicBool,
}

impl<S: ScheduleStore> ScheduleService<S> {
    /// Create a service that regenerates on first use.
    pub fn new(store: S, sink: ErrorSink) -> Self {
        Self {
            store,
            sink,
            cache: Mutex::new(None),
            stale: AtomicBool::new(true),
        }
    }

    /// Flag the cached grids as outdated; the next [`Self::current`] call
    /// regenerates. Called when the sync watcher publishes a change event.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// The schedule grid to control against right now, regenerating when the
    /// stale flag is set or the calendar day changed since the last build.
    pub async fn current(
        &self,
        inputs: &SynthesisInputs<'_>,
        now: Timestamp,
    ) -> ScheduleGrid {
        let mut cache = self.cache.lock().await;
        let today = unix_day(now);

        let fresh = !self.stale.load(Ordering::SeqCst)
            && cache.as_ref().is_some_and(|c| c.generated_day == today);
        if !fresh {
            let (schedule, presence) = synthesize(inputs, now);
            if let Err(err) = self.store.save_schedule(&schedule).await {
                self.sink
                    .report(Phase::Schedule, Severity::Moderate, err.to_string());
            }
            if let Err(err) = self.store.save_presence(&presence).await {
                self.sink
                    .report(Phase::Schedule, Severity::Moderate, err.to_string());
            }
            *cache = Some(Cached {
                schedule,
                generated_day: today,
            });
            self.stale.store(false, Ordering::SeqCst);
            tracing::info!(day = today, "schedule regenerated");
        }

        cache.as_ref().map(|c| c.schedule.clone()).unwrap_or_default()
    }
}
