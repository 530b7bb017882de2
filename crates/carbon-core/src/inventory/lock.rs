//! Cross-process lock guarding the master inventory.
//!
//! The lock is a file created with `create_new`; whoever creates it owns it
//! until the guard drops. Waiters poll every `sleep` until `timeout`.
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::inventory::error::{InventoryError, InventoryResult};

/// Shortest pause between attempts, used when the configured sleep is zero
const MIN_POLL: Duration = Duration::from_millis(10);

/// Held lock; removes the lock file on drop
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock file can be created or `timeout` elapses
    pub fn acquire(path: &Path, timeout: Duration, sleep: Duration) -> InventoryResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InventoryError::io(e, "lock directory creation", parent))?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Owner pid, for whoever has to clean up a stale lock by hand
                    let _ = writeln!(file, "{}", std::process::id());
                    log::debug!("Acquired inventory lock {}", path.display());
                    return Ok(Self { path: path.to_path_buf() });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(InventoryError::LockTimeout {
                            path: path.to_path_buf(),
                            waited,
                        });
                    }
                    log::debug!("Inventory lock {} is held, retrying", path.display());
                    std::thread::sleep(sleep.max(MIN_POLL).min(timeout - waited));
                }
                Err(e) => return Err(InventoryError::io(e, "lock acquisition", path)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release inventory lock {}: {}", self.path.display(), e);
        }
    }
}
