//! File-backed schedule and presence grids.

use std::future::Future;
use std::path::{Path, PathBuf};

use calor_app::ports::ScheduleStore;
use calor_domain::error::CalorError;
use calor_domain::schedule::{PresenceGrid, ScheduleGrid};

use crate::{read_json, write_json_atomic};

/// `condensed_schedule.json` and `presence_with_override.json` under the
/// data directory.
#[derive(Debug, Clone)]
pub struct JsonScheduleStore {
    schedule_path: PathBuf,
    presence_path: PathBuf,
}

impl JsonScheduleStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            schedule_path: data_dir.join("condensed_schedule.json"),
            presence_path: data_dir.join("presence_with_override.json"),
        }
    }
}

impl ScheduleStore for JsonScheduleStore {
    fn load_schedule(
        &self,
    ) -> impl Future<Output = Result<Option<ScheduleGrid>, CalorError>> + Send {
        let result = read_json(&self.schedule_path, "load_schedule").map_err(CalorError::from);
        async { result }
    }

    fn save_schedule(
        &self,
        grid: &ScheduleGrid,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result =
            write_json_atomic(&self.schedule_path, grid, "save_schedule").map_err(CalorError::from);
        async { result }
    }

    fn load_presence(
        &self,
    ) -> impl Future<Output = Result<Option<PresenceGrid>, CalorError>> + Send {
        let result = read_json(&self.presence_path, "load_presence").map_err(CalorError::from);
        async { result }
    }

    fn save_presence(
        &self,
        grid: &PresenceGrid,
    ) -> impl Future<Output = Result<(), CalorError>> + Send {
        let result =
            write_json_atomic(&self.presence_path, grid, "save_presence").map_err(CalorError::from);
        async { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calor_domain::id::RoomId;
    use calor_domain::schedule::{PresenceCell, ScheduleCell};
    use calor_domain::time::Slot;

    #[tokio::test]
    async fn should_load_none_when_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonScheduleStore::new(dir.path());
        assert!(store.load_schedule().await.unwrap().is_none());
        assert!(store.load_presence().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_roundtrip_schedule_grid() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonScheduleStore::new(dir.path());

        let mut grid = ScheduleGrid::new();
        grid.set(RoomId::new(1), Slot { day: 19_800, hour: 7 }, ScheduleCell::Target(20.5));
        grid.set(RoomId::new(1), Slot { day: 19_800, hour: 8 }, ScheduleCell::ForcedOff);

        store.save_schedule(&grid).await.unwrap();
        let loaded = store.load_schedule().await.unwrap().unwrap();
        assert_eq!(loaded, grid);
    }

    #[tokio::test]
    async fn should_roundtrip_presence_grid() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonScheduleStore::new(dir.path());

        let mut grid = PresenceGrid::new();
        grid.set(
            RoomId::new(2),
            Slot { day: 19_800, hour: 12 },
            PresenceCell::weekly(0.75),
        );

        store.save_presence(&grid).await.unwrap();
        let loaded = store.load_presence().await.unwrap().unwrap();
        assert_eq!(loaded, grid);
    }
}
