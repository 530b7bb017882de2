//! # Carbon Core Storage
//!
//! File access and process settings.
//!
//! - [`provider`]: the [`StorageProvider`] trait every writer in the core goes through.
//! - [`local`]: [`LocalStorageProvider`], atomic writes on the local filesystem.
//! - [`config`]: [`Config`], the immutable process-wide settings, and the
//!   format-aware [`ConfigData`] it is parsed from.
pub mod config;
pub mod error;
pub mod local;
pub mod provider;

pub use config::{Config, ConfigData, ConfigFormat, Credential};
pub use local::LocalStorageProvider;
pub use provider::StorageProvider;
