//! # calor-adapter-storage-json
//!
//! JSON-file persistence behind the storage and sync ports. Records are
//! whole-file JSON documents: the command queue is re-read from disk every
//! control cycle, which doubles as crash recovery. Writes go to a temporary
//! file first and are renamed into place so a crash mid-write never leaves a
//! half-written record.
//!
//! The data directory is owned by a single writer, made explicit by a PID
//! [`Lockfile`] the daemon acquires at startup.
//!
//! ## Dependency rule
//!
//! Depends on `calor-app` (port traits) and `calor-domain` only.

mod command_store;
mod lock;
mod remote;
mod schedule_store;
mod state_store;

pub use command_store::JsonCommandStore;
pub use lock::Lockfile;
pub use remote::FileRemoteSync;
pub use schedule_store::JsonScheduleStore;
pub use state_store::JsonStateStore;

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use calor_domain::error::StorageError;

/// Read a JSON document; a missing file reads as `None`.
fn read_json<T: DeserializeOwned>(
    path: &Path,
    operation: &'static str,
) -> Result<Option<T>, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::new(operation, err.to_string())),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|err| StorageError::new(operation, err.to_string()))
}

/// Write a JSON document atomically: temp file in the same directory, then
/// rename over the target.
fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    operation: &'static str,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| StorageError::new(operation, err.to_string()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| StorageError::new(operation, err.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|err| StorageError::new(operation, err.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|err| StorageError::new(operation, err.to_string()))
}

/// Append items to a JSON-array document.
fn append_json_array<T: Serialize>(
    path: &Path,
    items: &[T],
    operation: &'static str,
) -> Result<(), StorageError> {
    let mut existing: Vec<serde_json::Value> = read_json(path, operation)?.unwrap_or_default();
    for item in items {
        let value = serde_json::to_value(item)
            .map_err(|err| StorageError::new(operation, err.to_string()))?;
        existing.push(value);
    }
    write_json_atomic(path, &existing, operation)
}
