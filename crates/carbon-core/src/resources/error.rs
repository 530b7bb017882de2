//! # Carbon Core Resource Errors
//!
//! [`ResourceError`] is what the error taxonomy calls a configuration error:
//! anything wrong with a scenario descriptor or a resource built from it.
use std::path::PathBuf;

use crate::resources::ResourceType;
use crate::storage::error::StorageSystemError;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("{kind} '{resource}' is missing required field '{field}'")]
    MissingField {
        kind: ResourceType,
        resource: String,
        field: String,
    },

    #[error("{kind} '{resource}' has an invalid '{field}': {reason}")]
    InvalidField {
        kind: ResourceType,
        resource: String,
        field: String,
        reason: String,
    },

    #[error("{kind} '{resource}' sets both '{first}' and '{second}', only one is allowed")]
    ConflictingFields {
        kind: ResourceType,
        resource: String,
        first: String,
        second: String,
    },

    #[error("{kind} '{resource}' references credential '{credential}' which is not defined in the settings")]
    UnknownCredential {
        kind: ResourceType,
        resource: String,
        credential: String,
    },

    #[error("Duplicate {kind} name '{name}' in scenario '{scenario}'")]
    DuplicateName {
        kind: ResourceType,
        name: String,
        scenario: String,
    },

    #[error("Include cycle detected: {}", format_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },

    #[error("Failed to parse scenario descriptor '{path}': {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{kind} '{name}' not found in scenario")]
    NotFound { kind: ResourceType, name: String },

    #[error(transparent)]
    Storage(#[from] StorageSystemError),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
