//! Remote sync port: pull operator edits inward, push observability outward.
//!
//! The other side is a spreadsheet-backed remote key-value store: operators
//! edit weekly cycles, overrides, tunables and master switches there, and
//! dashboards read the state, decision and error records the controller
//! pushes back.

use std::future::Future;

use serde::{Deserialize, Serialize};

use calor_domain::error::{CalorError, Phase};
use calor_domain::schedule::{Override, ScheduleGrid, WeeklyCycle};
use calor_domain::state::{ControlDecision, SystemState};
use calor_domain::switch::MasterSwitch;
use calor_domain::time::Timestamp;
use calor_domain::tunables::ControlTunables;

/// Everything the controller pulls from the remote store, as one snapshot.
///
/// The sync watcher diffs consecutive snapshots structurally; equality is
/// the "nothing changed" fast path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub tunables: ControlTunables,
    pub switches: MasterSwitch,
    pub weekly_cycle: WeeklyCycle,
    pub overrides: Vec<Override>,
}

/// The "last error / phase" flag mirrored to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFlag {
    pub error: bool,
    pub phase: Option<Phase>,
    pub at: Timestamp,
}

impl ErrorFlag {
    #[must_use]
    pub fn clear(at: Timestamp) -> Self {
        Self {
            error: false,
            phase: None,
            at,
        }
    }

    #[must_use]
    pub fn raised(phase: Phase, at: Timestamp) -> Self {
        Self {
            error: true,
            phase: Some(phase),
            at,
        }
    }
}

/// Outbound port to the remote document/key-value store.
pub trait RemoteSync {
    /// Fetch the current remote snapshot.
    fn fetch_snapshot(&self)
    -> impl Future<Output = Result<RemoteSnapshot, CalorError>> + Send;

    fn push_state(
        &self,
        state: &SystemState,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;

    fn push_decision(
        &self,
        decision: &ControlDecision,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;

    fn push_schedule(
        &self,
        grid: &ScheduleGrid,
    ) -> impl Future<Output = Result<(), CalorError>> + Send;

    fn push_error(&self, flag: &ErrorFlag)
    -> impl Future<Output = Result<(), CalorError>> + Send;
}
