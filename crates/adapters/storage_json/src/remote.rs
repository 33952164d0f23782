//! File-spooled remote sync.
//!
//! The real remote is a spreadsheet-backed document store living outside
//! this repository. This adapter models that boundary with files: operator
//! edits arrive as `inbox/snapshot.json` (written by the synchronizer
//! service), and everything the controller publishes lands under `outbox/`
//! for the uploader to ship.

use std::future::Future;
use std::path::{Path, PathBuf};

use calor_app::ports::{ErrorFlag, RemoteSnapshot, RemoteSync};
use calor_domain::error::CalorError;
use calor_domain::schedule::ScheduleGrid;
use calor_domain::state::{ControlDecision, SystemState};

use crate::{read_json, write_json_atomic};

/// `inbox/` + `outbox/` file spool standing in for the remote store.
#[derive(Debug, Clone)]
pub struct FileRemoteSync {
    inbox: PathBuf,
    outbox: PathBuf,
}

impl FileRemoteSync {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            inbox: data_dir.join("inbox"),
            outbox: data_dir.join("outbox"),
        }
    }

    /// Path of the snapshot document operators' edits are read from.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.inbox.join("snapshot.json")
    }
}

impl RemoteSync for FileRemoteSync {
    /// An absent snapshot document reads as the default (everything auto,
    /// no overrides), so a fresh install controls sensibly before the first
    /// sync arrives.
    fn fetch_snapshot(&self) -> impl Future<Output = Result<RemoteSnapshot, CalorError>> + Send {
        let result = read_json(&self.snapshot_path(), "fetch_snapshot")
            .map(Option::unwrap_or_default)
            .map_err(CalorError::from);
        async { result }
    }

    fn push_state(&self, state: &SystemState) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result = write_json_atomic(&self.outbox.join("state.json"), state, "push_state")
            .map_err(CalorError::from);
        async { result }
    }

    fn push_decision(
        &self,
        decision: &ControlDecision,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result =
            write_json_atomic(&self.outbox.join("control.json"), decision, "push_decision")
                .map_err(CalorError::from);
        async { result }
    }

    fn push_schedule(
        &self,
        grid: &ScheduleGrid,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result = write_json_atomic(
            &self.outbox.join("condensed_schedule.json"),
            grid,
            "push_schedule",
        )
        .map_err(CalorError::from);
        async { result }
    }

    fn push_error(&self, flag: &ErrorFlag) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result = write_json_atomic(&self.outbox.join("error.json"), flag, "push_error")
            .map_err(CalorError::from);
        async { result }
    }
}
