//! PID lockfile enforcing single-writer ownership of the data directory.
//!
//! The command queue deliberately carries no per-operation locking; instead
//! the daemon takes this lock once at startup, making the single-instance
//! precondition explicit. A stale lock left by a crashed process must be
//! removed by the operator (the file names the owning PID).

use std::io::Write;
use std::path::{Path, PathBuf};

use calor_domain::error::StorageError;

/// An exclusively held `calord.lock` file; released on drop.
#[derive(Debug)]
pub struct Lockfile {
    path: PathBuf,
}

impl Lockfile {
    /// Acquire the lock for `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the lock is already held (the message
    /// names the owning PID) or the file cannot be created.
    pub fn acquire(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|err| StorageError::new("acquire_lock", err.to_string()))?;
        let path = data_dir.join("calord.lock");

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = std::fs::read_to_string(&path).unwrap_or_default();
                Err(StorageError::new(
                    "acquire_lock",
                    format!(
                        "data directory already locked by pid {}",
                        owner.trim()
                    ),
                ))
            }
            Err(err) => Err(StorageError::new("acquire_lock", err.to_string())),
        }
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
