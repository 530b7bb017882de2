//! # Carbon Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type.
//!
//! Every subsystem owns a typed error (`StorageSystemError`, `ResourceError`,
//! `BuilderError`, `PluginSystemError`, `PluginError`, `InventoryError`); this
//! enum wraps them so callers can propagate with `?` and the scenario driver
//! can map a failure onto a process exit code.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::inventory::error::InventoryError;
use crate::pipeline::error::BuilderError;
use crate::plugin_system::error::{PluginError, PluginSystemError};
use crate::resources::error::ResourceError;
use crate::storage::error::StorageSystemError;

/// Crate-wide error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed resource, missing field, unknown credential, include cycle.
    /// This is the `ConfigError` kind of the error taxonomy.
    #[error("Configuration error: {0}")]
    Resource(#[from] ResourceError),

    /// Unresolvable references or invalid builder options
    #[error("Pipeline build error: {0}")]
    Builder(#[from] BuilderError),

    /// Plugin registration or lookup failure
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// An error raised by a plugin entry point
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Inventory write or lock acquisition failure
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Settings file, snapshot, or other storage failure
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// User-initiated stop. Not a failure on its own.
    #[error("Run cancelled on user request")]
    Cancelled,

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Helper to create an I/O error with operation and path context
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Whether this error must abort the run before any further phase starts
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Plugin(_) | Error::Cancelled)
    }

    /// Exit code a driver run reports when it ends on this error.
    ///
    /// `2` for configuration and builder failures, `3` for inventory and lock
    /// failures, `1` for anything a plugin raised.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Resource(_) | Error::Builder(_) | Error::PluginSystem(_) => 2,
            Error::Inventory(_) => 3,
            Error::Plugin(_) => 1,
            Error::StorageSystem(_) | Error::Other(_) => 2,
            Error::Cancelled => 0,
        }
    }
}
