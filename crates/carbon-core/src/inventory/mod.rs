//! # Carbon Core Inventory
//!
//! Ansible inventory files of a run, under the configured inventory folder:
//!
//! - `master-<uid>`: every concrete asset of the scenario. Written after
//!   provision and trimmed after cleanup, always under the [`FileLock`].
//! - `unique-<task uid>`: the hosts of one orchestrate or execute task,
//!   created before the plugin runs and deleted right after.
pub mod error;
pub mod lock;
pub mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::kernel::constants::INVENTORY_LOCK_FILE;
use crate::kernel::generate_uid;
use crate::resources::{Asset, Resource};
use crate::storage::{Config, StorageProvider};

pub use error::{InventoryError, InventoryResult};
pub use lock::FileLock;
pub use render::{IniDocument, Section};

#[cfg(test)]
mod tests;

/// Inventory files of one scenario run
#[derive(Debug, Clone)]
pub struct Inventory {
    storage: Arc<dyn StorageProvider>,
    folder: PathBuf,
    uid: String,
    data_folder: PathBuf,
    lock_timeout: Duration,
    lock_sleep: Duration,
}

impl Inventory {
    pub fn new(storage: Arc<dyn StorageProvider>, config: &Config, uid: impl Into<String>, data_folder: &Path) -> Self {
        Self {
            storage,
            folder: config.inventory_folder(),
            uid: uid.into(),
            data_folder: data_folder.to_path_buf(),
            lock_timeout: config.lock_timeout(),
            lock_sleep: config.lock_sleep(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn master_path(&self) -> PathBuf {
        self.folder.join(format!("master-{}", self.uid))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.folder.join(INVENTORY_LOCK_FILE)
    }

    fn lock(&self) -> InventoryResult<FileLock> {
        FileLock::acquire(&self.lock_path(), self.lock_timeout, self.lock_sleep)
    }

    fn read_master(&self) -> InventoryResult<IniDocument> {
        let path = self.master_path();
        if !self.storage.is_file(&path) {
            return Ok(IniDocument::new());
        }
        Ok(IniDocument::parse(&self.storage.read_to_string(&path)?))
    }

    /// Merge `all_hosts` into the master inventory.
    ///
    /// Idempotent: writing the same hosts twice leaves the file unchanged. A
    /// host already present with a different `ansible_host` is an error and the
    /// file is left untouched.
    pub fn create_master(&self, all_hosts: &[Asset]) -> InventoryResult<PathBuf> {
        let path = self.master_path();
        let _lock = self.lock()?;
        let mut document = self.read_master()?;

        for asset in all_hosts {
            let requested = asset.ip_address().unwrap_or_default();
            if let Some(existing) = document.host_address(asset.name()) {
                if existing != requested {
                    return Err(InventoryError::Inconsistent {
                        path,
                        host: asset.name().to_string(),
                        existing: existing.to_string(),
                        requested: requested.to_string(),
                    });
                }
            }
        }
        for asset in all_hosts {
            document.insert_host(asset, &self.data_folder)?;
        }
        for asset in all_hosts {
            document.add_child(render::HOSTS_GROUP, asset.name());
        }

        self.storage.write_string(&path, &document.render())?;
        log::info!("Master inventory {} holds {} host(s)", path.display(), document.hosts().len());
        Ok(path)
    }

    /// Remove hosts from the master inventory, e.g. after they were torn down
    pub fn remove_hosts(&self, names: &[String]) -> InventoryResult<()> {
        let path = self.master_path();
        let _lock = self.lock()?;
        if !self.storage.is_file(&path) {
            return Ok(());
        }
        let mut document = self.read_master()?;
        for name in names {
            document.remove_host(name);
        }
        if document.hosts().is_empty() {
            self.storage.remove_file(&path)?;
            log::debug!("Master inventory {} is empty, removed", path.display());
        } else {
            self.storage.write_string(&path, &document.render())?;
        }
        Ok(())
    }

    /// Delete the master inventory if present
    pub fn delete_master(&self) -> InventoryResult<()> {
        let path = self.master_path();
        let _lock = self.lock()?;
        if self.storage.exists(&path) {
            self.storage.remove_file(&path)?;
            log::debug!("Deleted master inventory {}", path.display());
        }
        Ok(())
    }

    /// Write a transient inventory for one task's hosts. The caller deletes it.
    pub fn create_unique(&self, task: &str, hosts: &[&Asset]) -> InventoryResult<PathBuf> {
        let concrete: Vec<&Asset> = hosts.iter().copied().filter(|asset| asset.is_concrete()).collect();
        if concrete.is_empty() {
            return Err(InventoryError::NoHosts { task: task.to_string() });
        }
        let path = self.folder.join(format!("unique-{}", generate_uid()));
        let document = render::render_hosts(&concrete, &self.data_folder)?;
        self.storage.write_string(&path, &document.render())?;
        log::debug!("Wrote unique inventory {} for {}", path.display(), task);
        Ok(path)
    }

    /// Delete a unique inventory if present
    pub fn delete_unique(&self, path: &Path) -> InventoryResult<()> {
        if self.storage.exists(path) {
            self.storage.remove_file(path)?;
        }
        Ok(())
    }
}
