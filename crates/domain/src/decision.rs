//! Per-room control regimes, votes and aggregation.
//!
//! Each control cycle every room selects exactly one regime from an explicit
//! precedence list and votes on/off for its cycle's pump. Regime selection
//! and the per-regime decision functions are pure: the engine gathers the
//! inputs, calls [`decide`] and applies the outcome.
//!
//! Precedence, highest first:
//! 1. [`Regime::ScheduledOff`]: the schedule cell forces the cycle off
//! 2. [`Regime::CycleMasterOverride`]: operator switched the cycle
//! 3. [`Regime::RoomMasterOverride`]: operator switched the room
//! 4. [`Regime::StaleFallback`]: sensor data missing or expired
//! 5. [`Regime::ValveDemand`]: the room has live valve telemetry
//! 6. [`Regime::PlainHysteresis`]: temperature-only control

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::room::Room;
use crate::schedule::ScheduleCell;
use crate::switch::SwitchMode;
use crate::time::Timestamp;
use crate::tunables::ControlTunables;

/// A heating demand: on or off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    #[default]
    Off,
    On,
}

impl Vote {
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// `sign(sum)` collapsed back to a vote: any positive demand wins.
    #[must_use]
    pub fn from_sum(sum: i32) -> Self {
        if sum > 0 { Self::On } else { Self::Off }
    }
}

impl From<bool> for Vote {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// The control regime a room's vote was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    ScheduledOff,
    CycleMasterOverride,
    RoomMasterOverride,
    StaleFallback,
    ValveDemand,
    PlainHysteresis,
}

/// Reason code attached to every vote for dashboards and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    CycleScheduledOff,
    CycleMasterOn,
    CycleMasterOff,
    RoomMasterOn,
    RoomMasterOff,
    TimedOn,
    TimedOff,
    ClosedValves,
    OpenValves,
    DemandHysteresisOn,
    DemandHysteresisOff,
    AboveSetpointRegime,
    BelowSetTemp,
    AboveSetTemp,
    HysteresisOn,
    HysteresisOff,
    /// The room's vote path failed; the previous vote was carried forward.
    Skipped,
}

/// Setpoint and reference temperature to push to a room's valves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValveUpdate {
    /// Biased heat setpoint in degrees.
    pub setpoint: f64,
    /// Measured room temperature, rounded to the valve's 0.25 degree step.
    pub measured: f64,
}

/// Everything regime selection and the decision functions need for one room.
#[derive(Debug, Clone)]
pub struct RoomVoteContext<'a> {
    pub room: &'a Room,
    pub cell: ScheduleCell,
    pub cycle_switch: SwitchMode,
    pub room_switch: SwitchMode,
    pub measured: Option<f64>,
    pub measured_at: Option<Timestamp>,
    /// Highest opening percentage across the room's valves, if telemetry is
    /// available.
    pub valve_demand: Option<f64>,
    /// The room's vote from the previous cycle (hysteresis memory).
    pub prev_vote: Vote,
    pub now: Timestamp,
}

impl RoomVoteContext<'_> {
    fn data_stale(&self, tunables: &ControlTunables) -> bool {
        match (self.measured, self.measured_at) {
            (Some(_), Some(at)) => {
                self.now - at > Duration::minutes(tunables.temp_data_expiry_mins)
            }
            _ => true,
        }
    }
}

/// The outcome of one room's vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomOutcome {
    pub vote: Vote,
    pub regime: Regime,
    pub reason: Reason,
    /// Present only under valve-demand control.
    pub valve: Option<ValveUpdate>,
}

impl RoomOutcome {
    fn plain(vote: Vote, regime: Regime, reason: Reason) -> Self {
        Self {
            vote,
            regime,
            reason,
            valve: None,
        }
    }
}

/// Select the regime for a room; see the module docs for the precedence.
#[must_use]
pub fn select_regime(ctx: &RoomVoteContext<'_>, tunables: &ControlTunables) -> Regime {
    if matches!(ctx.cell, ScheduleCell::ForcedOff) {
        Regime::ScheduledOff
    } else if ctx.cycle_switch != SwitchMode::Auto {
        Regime::CycleMasterOverride
    } else if ctx.room_switch != SwitchMode::Auto {
        Regime::RoomMasterOverride
    } else if ctx.data_stale(tunables) {
        Regime::StaleFallback
    } else if ctx.room.has_valves() && ctx.valve_demand.is_some() {
        Regime::ValveDemand
    } else {
        Regime::PlainHysteresis
    }
}

/// Run the room through its selected regime and produce a vote.
#[must_use]
pub fn decide(ctx: &RoomVoteContext<'_>, tunables: &ControlTunables) -> RoomOutcome {
    match select_regime(ctx, tunables) {
        Regime::ScheduledOff => decide_scheduled_off(),
        Regime::CycleMasterOverride => decide_cycle_master(ctx.cycle_switch),
        Regime::RoomMasterOverride => decide_room_master(ctx.room_switch),
        Regime::StaleFallback => decide_stale_fallback(ctx),
        Regime::ValveDemand => decide_valve_demand(ctx, tunables),
        Regime::PlainHysteresis => decide_plain_hysteresis(ctx, tunables),
    }
}

fn decide_scheduled_off() -> RoomOutcome {
    RoomOutcome::plain(Vote::Off, Regime::ScheduledOff, Reason::CycleScheduledOff)
}

fn decide_cycle_master(mode: SwitchMode) -> RoomOutcome {
    let vote = mode.forced_vote().unwrap_or(Vote::Off);
    let reason = if vote.is_on() {
        Reason::CycleMasterOn
    } else {
        Reason::CycleMasterOff
    };
    RoomOutcome::plain(vote, Regime::CycleMasterOverride, reason)
}

fn decide_room_master(mode: SwitchMode) -> RoomOutcome {
    let vote = mode.forced_vote().unwrap_or(Vote::Off);
    let reason = if vote.is_on() {
        Reason::RoomMasterOn
    } else {
        Reason::RoomMasterOff
    };
    RoomOutcome::plain(vote, Regime::RoomMasterOverride, reason)
}

/// Without fresh temperature data the schedule degrades to timed on/off:
/// targets above the room's threshold count as "on" hours.
fn decide_stale_fallback(ctx: &RoomVoteContext<'_>) -> RoomOutcome {
    let timed_on = ctx
        .cell
        .target()
        .is_some_and(|target| target > ctx.room.threshold_temp);
    if timed_on {
        RoomOutcome::plain(Vote::On, Regime::StaleFallback, Reason::TimedOn)
    } else {
        RoomOutcome::plain(Vote::Off, Regime::StaleFallback, Reason::TimedOff)
    }
}

/// Demand control for rooms with addressable valves.
///
/// The valves get a setpoint biased above the target while the room is
/// clearly below it; the vote follows the reported opening percentage against
/// a hysteresis band whose open threshold moves with the error: close to the
/// target a wide-open valve is required to call for heat, far below it a
/// slightly open valve suffices.
fn decide_valve_demand(ctx: &RoomVoteContext<'_>, tunables: &ControlTunables) -> RoomOutcome {
    let target = ctx.cell.target().unwrap_or(ctx.room.warming.t_min);
    let measured = ctx.measured.unwrap_or(target);
    let demand = ctx.valve_demand.unwrap_or(0.0);

    let error = (target - measured).max(0.0);
    let regime_low = target - tunables.error_min;
    let regime_high = target + tunables.error_min;

    let setpoint = if measured < regime_low {
        target + error * tunables.error_gain + tunables.error_offset
    } else {
        target
    };
    let valve = Some(ValveUpdate {
        setpoint,
        measured: round_to_multiple(measured, 0.25),
    });

    // Linear between open_max at error <= error_min and open_min at
    // error >= error_max.
    let open_span = tunables.demand_hysteresis_open_max - tunables.demand_hysteresis_open_min;
    let error_span = tunables.error_max - tunables.error_min;
    let saturation = ((error - tunables.error_min) / error_span).clamp(0.0, 1.0);
    let open_threshold = tunables.demand_hysteresis_open_max - saturation * open_span;

    let (vote, reason) = if measured > regime_high {
        // Never start heating above the setpoint regime, whatever the valves say.
        (Vote::Off, Reason::AboveSetpointRegime)
    } else if demand > open_threshold {
        (Vote::On, Reason::OpenValves)
    } else if demand < tunables.demand_hysteresis_close {
        (Vote::Off, Reason::ClosedValves)
    } else if ctx.prev_vote.is_on() {
        (Vote::On, Reason::DemandHysteresisOn)
    } else {
        (Vote::Off, Reason::DemandHysteresisOff)
    };

    RoomOutcome {
        vote,
        regime: Regime::ValveDemand,
        reason,
        valve,
    }
}

fn decide_plain_hysteresis(ctx: &RoomVoteContext<'_>, tunables: &ControlTunables) -> RoomOutcome {
    let target = ctx.cell.target().unwrap_or(ctx.room.warming.t_min);
    let measured = ctx.measured.unwrap_or(target);

    if measured < target - tunables.hysteresis_buffer {
        RoomOutcome::plain(Vote::On, Regime::PlainHysteresis, Reason::BelowSetTemp)
    } else if measured > target + tunables.hysteresis_buffer {
        RoomOutcome::plain(Vote::Off, Regime::PlainHysteresis, Reason::AboveSetTemp)
    } else if ctx.prev_vote.is_on() {
        RoomOutcome::plain(Vote::On, Regime::PlainHysteresis, Reason::HysteresisOn)
    } else {
        RoomOutcome::plain(Vote::Off, Regime::PlainHysteresis, Reason::HysteresisOff)
    }
}

/// Boolean OR across votes realized through signed sums.
#[must_use]
pub fn aggregate(votes: impl IntoIterator<Item = Vote>) -> Vote {
    Vote::from_sum(votes.into_iter().map(Vote::as_i32).sum())
}

fn round_to_multiple(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}
