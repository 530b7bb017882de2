//! # Carbon Core Pipelines
//!
//! A [`Pipeline`] is the ordered task list one phase (or one notification
//! trigger) compiles to.
//!
//! - [`builder`]: [`PipelineBuilder`], one pipeline per phase, honoring label
//!   filters, shadowing across included scenarios, status filtering, host and
//!   execute resolution, and the cleanup reversal.
//! - [`notify`]: [`NotificationPipelineBuilder`], one pipeline per trigger.
//! - [`show`]: plain-text listing of pipelines, used for dry runs.
pub mod builder;
pub mod error;
pub mod notify;
pub mod show;

use crate::task::{TaskDescriptor, TaskKind};

pub use builder::PipelineBuilder;
pub use error::{BuilderError, BuilderResult};
pub use notify::NotificationPipelineBuilder;

/// A named, ordered list of task descriptors of a single kind
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    kind: TaskKind,
    tasks: Vec<TaskDescriptor>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, kind: TaskKind, tasks: Vec<TaskDescriptor>) -> Self {
        Self {
            name: name.into(),
            kind,
            tasks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<TaskDescriptor> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resource names in task order
    pub fn resource_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.resource.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests;
