use std::path::PathBuf;
use std::time::Duration;

use crate::storage::error::StorageSystemError;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("I/O error during inventory {operation} on '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageSystemError),

    #[error(
        "Timed out after {waited:?} waiting for inventory lock '{path}'; if no other run is active, the lock is stale and can be removed"
    )]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error(
        "Master inventory '{path}' already maps host '{host}' to {existing}, refusing to change it to {requested}"
    )]
    Inconsistent {
        path: PathBuf,
        host: String,
        existing: String,
        requested: String,
    },

    #[error("Asset '{host}' has no ip_address and cannot be written to an inventory")]
    MissingAddress { host: String },

    #[error("No concrete hosts to write to inventory for {task}")]
    NoHosts { task: String },
}

impl InventoryError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        InventoryError::Io {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}

pub type InventoryResult<T> = std::result::Result<T, InventoryError>;
