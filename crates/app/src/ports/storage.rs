//! Storage ports: persistence for commands, grids and snapshots.
//!
//! Persistence is deliberately load/save-whole-record: the command queue is
//! re-read from disk every control cycle, which is also the crash-recovery
//! path (commands persisted but not executed are picked up next cycle).

use std::future::Future;

use calor_domain::command::{Command, CommandQueue};
use calor_domain::error::CalorError;
use calor_domain::schedule::{PresenceGrid, ScheduleGrid};
use calor_domain::state::{ControlDecision, SystemState};

/// Persistence for the live command queue and the append-only archive.
pub trait CommandStore {
    /// Load the pending queue; an absent backing record is an empty queue.
    fn load(&self) -> impl Future<Output = Result<CommandQueue, CalorError>> + Send;

    /// Replace the pending queue.
    fn save(&self, queue: &CommandQueue) -> impl Future<Output = Result<(), CalorError>> + Send;

    /// Append commands to the archive.
    fn archive(&self, commands: &[Command])
    -> impl Future<Output = Result<(), CalorError>> + Send;
}

/// Persistence for the synthesized schedule and presence grids.
pub trait ScheduleStore {
    fn load_schedule(
        &self,
    ) -> impl Future<Output = Result<Option<ScheduleGrid>, CalorError>> + Send;

    fn save_schedule(
        &self,
        grid: &ScheduleGrid,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;

    fn load_presence(
        &self,
    ) -> impl Future<Output = Result<Option<PresenceGrid>, CalorError>> + Send;

    fn save_presence(
        &self,
        grid: &PresenceGrid,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;
}

/// Persistence for state snapshots and decision records.
pub trait StateStore {
    /// Last exported snapshot, used to carry hysteresis memory forward.
    fn load_state(&self) -> impl Future<Output = Result<Option<SystemState>, CalorError>> + Send;

    fn save_state(&self, state: &SystemState)
    -> impl Future<Output = Result<(), CalorError>> + Send;

    fn save_decision(
        &self,
        decision: &ControlDecision,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;
}
