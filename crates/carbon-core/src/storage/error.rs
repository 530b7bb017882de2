//! # Carbon Core Storage System Errors
//!
//! Defines error types specific to the storage layer: file I/O through a
//! [`StorageProvider`](crate::storage::StorageProvider), settings file
//! parsing, and snapshot serialization.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("{operation} failed on '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No such file: {0}")]
    FileNotFound(PathBuf),

    #[error("Cannot render {format}: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Cannot parse {format}: {source}")]
    DeserializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported settings file format: {0}")]
    UnsupportedConfigFormat(String),

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// Writes need a parent folder to place the temporary sibling in
    #[error("Cannot write '{0}': path has no parent directory")]
    NoParent(PathBuf),
}

impl StorageSystemError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}

/// Shorthand for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageSystemError>;
