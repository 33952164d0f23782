//! File-backed command queue and archive.

use std::future::Future;
use std::path::{Path, PathBuf};

use calor_app::ports::CommandStore;
use calor_domain::command::{Command, CommandQueue};
use calor_domain::error::CalorError;

use crate::{append_json_array, read_json, write_json_atomic};

/// `commands.json` (live queue) and `commands_archive.json` (append-only)
/// under the data directory.
#[derive(Debug, Clone)]
pub struct JsonCommandStore {
    queue_path: PathBuf,
    archive_path: PathBuf,
}

impl JsonCommandStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            queue_path: data_dir.join("commands.json"),
            archive_path: data_dir.join("commands_archive.json"),
        }
    }
}

impl CommandStore for JsonCommandStore {
    fn load(&self) -> impl Future<Output = Result<CommandQueue, CalorError>> + Send {
        let result = read_json(&self.queue_path, "load_commands")
            .map(Option::unwrap_or_default)
            .map_err(CalorError::from);
        async { result }
    }

    fn save(&self, queue: &CommandQueue) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result =
            write_json_atomic(&self.queue_path, queue, "save_commands").map_err(CalorError::from);
        async { result }
    }

    fn archive(
        &self,
        commands: &[Command],
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result = append_json_array(&self.archive_path, commands, "archive_commands")
            .map_err(CalorError::from);
        async { result }
    }
}
