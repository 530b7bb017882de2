//! # Carbon Core Plugin System
//!
//! Typed plugin classes and the registry resources resolve them through.
//!
//! Plugins are registered explicitly at startup, one map per class keyed by
//! plugin name. The core only depends on the entry points declared in
//! [`traits`]; every call is blocking and runs on a runner worker.
pub mod builtin;
pub mod error;
pub mod registry;
pub mod traits;
pub mod version;

use std::fmt;

use serde::Serialize;

pub use error::{PluginError, PluginErrorKind, PluginSystemError};
pub use registry::PluginRegistry;
pub use traits::{
    ConcreteAsset, CreateResult, ExecuteOutput, Executor, ImportResult, Importer, Notifier, Orchestrator, Plugin,
    PluginContext, PluginResult, Provisioner, ResourceChecker,
};

/// The plugin families the registry keeps apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginClass {
    Provisioner,
    Orchestrator,
    Executor,
    Importer,
    Notifier,
    ResourceChecker,
}

impl fmt::Display for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginClass::Provisioner => "provisioner",
            PluginClass::Orchestrator => "orchestrator",
            PluginClass::Executor => "executor",
            PluginClass::Importer => "importer",
            PluginClass::Notifier => "notifier",
            PluginClass::ResourceChecker => "resource checker",
        };
        f.write_str(name)
    }
}
