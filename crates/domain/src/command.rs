//! Device commands: issuance, de-duplication and due-time selection.
//!
//! Commands make control decisions durable: a vote that differs from the
//! live device state becomes a dated command, persisted by the store and
//! applied once due. The queue enforces two invariants:
//!
//! - a command is only appended when no unexecuted command for the same
//!   device is already due sooner (issuance de-duplication), and
//! - among due commands, only the one with the latest issuance time per
//!   device is ever applied; the rest are superseded and archived untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::id::{CommandId, CycleId};
use crate::time::Timestamp;

/// A controllable device in the fixed set the executor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Device {
    /// The circulation pump of a cycle.
    Pump(CycleId),
    /// The boiler relay.
    Boiler,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pump(cycle) => write!(f, "pump_{cycle}"),
            Self::Boiler => f.write_str("boiler"),
        }
    }
}

/// Error parsing a device name.
#[derive(Debug, thiserror::Error)]
#[error("unknown device name: {0}")]
pub struct ParseDeviceError(String);

impl FromStr for Device {
    type Err = ParseDeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "boiler" {
            return Ok(Self::Boiler);
        }
        s.strip_prefix("pump_")
            .and_then(|n| n.parse().ok())
            .map(Self::Pump)
            .ok_or_else(|| ParseDeviceError(s.to_string()))
    }
}

// Persisted command records carry the operator-facing device names
// ("pump_2", "boiler"), so serialize through Display/FromStr.
impl Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A dated on/off instruction for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub device: Device,
    pub on: bool,
    pub issued_at: Timestamp,
    pub due_at: Timestamp,
    pub executed: bool,
    pub executed_at: Option<Timestamp>,
}

impl Command {
    #[must_use]
    pub fn new(device: Device, on: bool, issued_at: Timestamp, due_at: Timestamp) -> Self {
        Self {
            id: CommandId::new(),
            device,
            on,
            issued_at,
            due_at,
            executed: false,
            executed_at: None,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        !self.executed && self.due_at <= now
    }

    /// Mark the command applied. Only the executor calls this.
    pub fn mark_executed(&mut self, at: Timestamp) {
        self.executed = true;
        self.executed_at = Some(at);
    }
}

/// The live command queue, re-read from storage every control cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_commands(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Issue a command due `delay` from `now`, unless redundant.
    ///
    /// The command is redundant while an unexecuted command for the same
    /// device has an earlier due time: a sooner action is already pending and
    /// re-queuing would only pile up duplicates.
    pub fn issue(
        &mut self,
        device: Device,
        on: bool,
        delay: Duration,
        now: Timestamp,
    ) -> Option<CommandId> {
        let due_at = now + delay;
        let redundant = self
            .commands
            .iter()
            .any(|c| !c.executed && c.device == device && c.due_at < due_at);
        if redundant {
            return None;
        }
        let command = Command::new(device, on, now, due_at);
        let id = command.id;
        self.commands.push(command);
        Some(id)
    }

    /// Partition the queue for one execution pass.
    #[must_use]
    pub fn plan(&self, now: Timestamp) -> ExecutionPlan {
        let mut plan = ExecutionPlan::default();
        let mut latest_due: BTreeMap<Device, Command> = BTreeMap::new();

        for command in &self.commands {
            if command.executed {
                plan.executed.push(command.clone());
            } else if command.due_at > now {
                plan.future.push(command.clone());
            } else {
                match latest_due.get(&command.device) {
                    Some(current) if current.issued_at >= command.issued_at => {
                        plan.superseded.push(command.clone());
                    }
                    Some(_) => {
                        let displaced = latest_due.insert(command.device, command.clone());
                        plan.superseded.extend(displaced);
                    }
                    None => {
                        latest_due.insert(command.device, command.clone());
                    }
                }
            }
        }

        plan.due = latest_due.into_values().collect();
        plan
    }
}

/// One execution pass worth of partitioned commands.
///
/// `due` holds at most one command per device: the latest-issued unexecuted
/// command past its due time. Older due commands for the same device land in
/// `superseded`; they are archived unexecuted rather than applied.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub due: Vec<Command>,
    pub superseded: Vec<Command>,
    pub future: Vec<Command>,
    pub executed: Vec<Command>,
}
