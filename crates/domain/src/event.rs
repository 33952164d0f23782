//! Domain events carried by the in-process bus.
//!
//! The sync watcher publishes change flags as events; the schedule service
//! and the control loop consume them. Events never mutate engine state
//! directly.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, RoomId};
use crate::time::{Timestamp, now};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Control tunables or master switches changed upstream.
    ConfigChanged,
    /// The manual override list changed upstream.
    OverridesChanged,
    /// A room's declared weekly cycle changed upstream.
    WeeklyCycleChanged,
    /// The synthesized schedule must be rebuilt.
    ScheduleStale,
    /// A fresh schedule grid was produced.
    ScheduleRegenerated,
    /// The executor applied a command.
    CommandExecuted,
    /// One decide→persist→execute→export pass finished.
    ControlCycleCompleted,
    /// A component reported a failure.
    ErrorRaised,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ConfigChanged => "config_changed",
            Self::OverridesChanged => "overrides_changed",
            Self::WeeklyCycleChanged => "weekly_cycle_changed",
            Self::ScheduleStale => "schedule_stale",
            Self::ScheduleRegenerated => "schedule_regenerated",
            Self::CommandExecuted => "command_executed",
            Self::ControlCycleCompleted => "control_cycle_completed",
            Self::ErrorRaised => "error_raised",
        };
        f.write_str(name)
    }
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    /// The room concerned, for room-scoped kinds.
    pub room: Option<RoomId>,
    pub at: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            kind,
            room: None,
            at: now(),
        }
    }

    #[must_use]
    pub fn for_room(kind: EventKind, room: RoomId) -> Self {
        Self {
            room: Some(room),
            ..Self::new(kind)
        }
    }
}
