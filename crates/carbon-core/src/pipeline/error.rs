//! # Carbon Core Pipeline Errors
//!
//! Defines [`BuilderError`], raised while compiling a phase pipeline from a
//! scenario. Every variant is fatal for the run.
use thiserror::Error;

use crate::resources::ResourceType;
use crate::task::TaskKind;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("'labels' and 'skip_labels' cannot be used together")]
    ExclusiveLabels,

    #[error("{kind} '{resource}' references unknown hosts: {}", hosts.join(", "))]
    UnresolvedHosts {
        kind: ResourceType,
        resource: String,
        hosts: Vec<String>,
    },

    #[error("report '{report}' references unknown executes: {}", executes.join(", "))]
    UnresolvedExecutes { report: String, executes: Vec<String> },

    #[error("Unknown task '{0}', expected one of validate, provision, orchestrate, execute, report, cleanup")]
    UnknownPhase(String),

    #[error("'{0}' is not a phase; notification pipelines are built per trigger")]
    NotAPhase(TaskKind),
}

/// Shorthand for builder operations
pub type BuilderResult<T> = std::result::Result<T, BuilderError>;
