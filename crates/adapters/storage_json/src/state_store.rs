//! File-backed state and decision snapshots.

use std::future::Future;
use std::path::{Path, PathBuf};

use calor_app::ports::StateStore;
use calor_domain::error::CalorError;
use calor_domain::state::{ControlDecision, SystemState};

use crate::{read_json, write_json_atomic};

/// `state.json` (latest snapshot) and `control.json` (latest decision)
/// under the data directory.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    state_path: PathBuf,
    decision_path: PathBuf,
}

impl JsonStateStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            state_path: data_dir.join("state.json"),
            decision_path: data_dir.join("control.json"),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load_state(&self) -> impl Future<Output = Result<Option<SystemState>, CalorError>> + Send {
        let result = read_json(&self.state_path, "load_state").map_err(CalorError::from);
        async { result }
    }

    fn save_state(
        &self,
        state: &SystemState,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result =
            write_json_atomic(&self.state_path, state, "save_state").map_err(CalorError::from);
        async { result }
    }

    fn save_decision(
        &self,
        decision: &ControlDecision,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result = write_json_atomic(&self.decision_path, decision, "save_decision")
            .map_err(CalorError::from);
        async { result }
    }
}
