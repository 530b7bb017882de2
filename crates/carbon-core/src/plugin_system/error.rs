//! # Carbon Core Plugin System Errors
//!
//! [`PluginSystemError`] covers registry failures: duplicate registration,
//! incompatible API versions, lookups of unknown plugins.
//!
//! [`PluginError`] is what a plugin entry point returns when it fails. The
//! runner never propagates it; it records the traceback on the resource and
//! moves on.
use std::fmt;

use serde::Serialize;

use crate::plugin_system::PluginClass;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("{class} plugin '{name}' is already registered")]
    DuplicatePlugin { class: PluginClass, name: String },

    #[error("{class} plugin '{name}' is not compatible with API version {api_version} (supports {supported})")]
    IncompatibleApiVersion {
        class: PluginClass,
        name: String,
        api_version: String,
        supported: String,
    },

    #[error("{class} plugin '{name}' declares an invalid API range: {source}")]
    InvalidApiRange {
        class: PluginClass,
        name: String,
        #[source]
        source: VersionError,
    },

    #[error("No {class} plugin named '{name}' is registered")]
    PluginNotFound { class: PluginClass, name: String },
}

/// Broad category of a plugin failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginErrorKind {
    Validation,
    Authentication,
    Provision,
    Teardown,
    Orchestration,
    Execution,
    Import,
    Notification,
    ResourceCheck,
    /// A task's hosts had no concrete address to run against
    HostUnavailable,
    /// The worker running the plugin call panicked
    Panic,
    Other,
}

impl fmt::Display for PluginErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginErrorKind::Validation => "validation",
            PluginErrorKind::Authentication => "authentication",
            PluginErrorKind::Provision => "provision",
            PluginErrorKind::Teardown => "teardown",
            PluginErrorKind::Orchestration => "orchestration",
            PluginErrorKind::Execution => "execution",
            PluginErrorKind::Import => "import",
            PluginErrorKind::Notification => "notification",
            PluginErrorKind::ResourceCheck => "resource_check",
            PluginErrorKind::HostUnavailable => "host_unavailable",
            PluginErrorKind::Panic => "panic",
            PluginErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure raised by a plugin entry point
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct PluginError {
    pub kind: PluginErrorKind,
    pub message: String,
    /// Multi-line detail for the debug log and the results snapshot
    pub traceback: String,
}

impl PluginError {
    pub fn new(kind: PluginErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            traceback: message.clone(),
            message,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = traceback.into();
        self
    }

    /// Wrap any error, keeping its source chain as the traceback
    pub fn from_error(kind: PluginErrorKind, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut traceback = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            traceback.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        Self {
            kind,
            message: error.to_string(),
            traceback,
        }
    }

    /// First line of the message, for stderr
    pub fn summary(&self) -> String {
        let first = self.message.lines().next().unwrap_or_default();
        format!("{}: {}", self.kind, first)
    }
}
