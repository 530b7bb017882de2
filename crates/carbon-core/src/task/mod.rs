//! # Carbon Core Task Registry
//!
//! The fixed set of task kinds a scenario run is made of, their default
//! concurrency, and the [`TaskDescriptor`] records the pipeline builders emit
//! and the runner consumes.
pub mod descriptor;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use descriptor::{
    DeclaredTask, HostSet, Method, MethodCall, MethodReturn, RunSummary, TaskDescriptor, TaskPayload, TaskRecord,
};

/// A task kind. The first six are the run phases, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Validate,
    Provision,
    Orchestrate,
    Execute,
    Report,
    Cleanup,
    Notification,
}

impl TaskKind {
    /// The run phases in the order the driver executes them
    pub const PHASES: [TaskKind; 6] = [
        TaskKind::Validate,
        TaskKind::Provision,
        TaskKind::Orchestrate,
        TaskKind::Execute,
        TaskKind::Report,
        TaskKind::Cleanup,
    ];

    /// Stable lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Validate => "validate",
            TaskKind::Provision => "provision",
            TaskKind::Orchestrate => "orchestrate",
            TaskKind::Execute => "execute",
            TaskKind::Report => "report",
            TaskKind::Cleanup => "cleanup",
            TaskKind::Notification => "notification",
        }
    }

    /// Whether tasks of this kind run in parallel unless overridden
    pub fn default_concurrent(&self) -> bool {
        match self {
            TaskKind::Validate | TaskKind::Provision | TaskKind::Report | TaskKind::Cleanup => true,
            TaskKind::Orchestrate | TaskKind::Execute | TaskKind::Notification => false,
        }
    }

    /// Whether this kind is one of the run phases
    pub fn is_phase(&self) -> bool {
        !matches!(self, TaskKind::Notification)
    }

    /// Resolve concurrency: resource attribute, then settings, then the kind default
    pub fn resolve_concurrency(&self, resource_level: Option<bool>, settings_level: Option<bool>) -> bool {
        resource_level
            .or(settings_level)
            .unwrap_or_else(|| self.default_concurrent())
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "validate" => Ok(TaskKind::Validate),
            "provision" => Ok(TaskKind::Provision),
            "orchestrate" => Ok(TaskKind::Orchestrate),
            "execute" => Ok(TaskKind::Execute),
            "report" => Ok(TaskKind::Report),
            "cleanup" => Ok(TaskKind::Cleanup),
            "notification" => Ok(TaskKind::Notification),
            other => Err(format!(
                "unknown task '{}' (expected one of validate, provision, orchestrate, execute, report, cleanup)",
                other
            )),
        }
    }
}
