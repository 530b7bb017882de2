//! # Carbon Core Resources
//!
//! The typed records a scenario is made of.
//!
//! Every resource embeds a [`ResourceBase`] carrying the common attributes
//! (name, description, labels, status, last error) and the shared
//! [`ResourceContext`]. Identity fields are fixed once a resource is built;
//! the runner only touches the mutators for status and the few fields plugins
//! report back (`ip_address`, `artifact_locations`, `import_results`).
//!
//! - [`Asset`]: a machine, static or provisioned by a provider.
//! - [`Action`]: configuration work run on a set of assets.
//! - [`Execute`]: test execution run on a set of assets.
//! - [`Report`]: artifact import for a set of executes.
//! - [`Notification`]: a message fired on a [`Trigger`](notification::Trigger).
//! - [`Scenario`]: the root container, owning the above and its included children.
pub mod action;
pub mod asset;
pub mod error;
pub mod execute;
pub mod loader;
pub mod notification;
pub mod report;
pub mod scenario;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::Config;
use crate::task::{DeclaredTask, TaskKind};

pub use action::Action;
pub use asset::{Asset, ProviderSpec};
pub use error::{ResourceError, ResourceResult};
pub use execute::Execute;
pub use loader::ScenarioLoader;
pub use notification::Notification;
pub use report::Report;
pub use scenario::{Ledger, Scenario, SharedLedger};

/// Label set of a resource. Ordered so snapshots and logs are stable.
pub type Labels = BTreeSet<String>;

/// The resource families a scenario holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Scenario,
    Asset,
    Action,
    Execute,
    Report,
    Notification,
}

impl ResourceType {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Scenario => "scenario",
            ResourceType::Asset => "asset",
            ResourceType::Action => "action",
            ResourceType::Execute => "execute",
            ResourceType::Report => "report",
            ResourceType::Notification => "notification",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Locates a resource inside a scenario tree.
///
/// `scope` is the path of child-scenario indices from the root (empty for the
/// root scenario itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub kind: ResourceType,
    pub scope: Vec<usize>,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceType, scope: &[usize], name: impl Into<String>) -> Self {
        Self {
            kind,
            scope: scope.to_vec(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// What every resource of one scenario run shares
#[derive(Debug, Clone)]
pub struct ResourceContext {
    config: Arc<Config>,
    workspace: PathBuf,
    data_folder: PathBuf,
}

impl ResourceContext {
    pub fn new(config: Arc<Config>, data_folder: impl Into<PathBuf>) -> Self {
        Self {
            workspace: config.workspace().to_path_buf(),
            config,
            data_folder: data_folder.into(),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }
}

/// Attributes common to every resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceBase {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    labels: Labels,
    status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
    #[serde(skip)]
    concurrent: Option<bool>,
    #[serde(skip)]
    context: ResourceContext,
}

impl ResourceBase {
    pub fn new(name: impl Into<String>, context: &ResourceContext) -> Self {
        Self {
            name: name.into(),
            description: None,
            labels: Labels::new(),
            status: 0,
            last_error: None,
            concurrent: None,
            context: context.clone(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrent(mut self, concurrent: Option<bool>) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Same attributes under a new name, status reset. Used for expanded assets.
    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: 0,
            last_error: None,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn concurrent(&self) -> Option<bool> {
        self.concurrent
    }

    pub fn context(&self) -> &ResourceContext {
        &self.context
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.context.config
    }

    pub fn mark_passed(&mut self) {
        self.status = 0;
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.status = 1;
        self.last_error = Some(trace.into());
    }
}

/// Common behaviour of the typed resources
pub trait Resource {
    fn resource_type(&self) -> ResourceType;

    fn base(&self) -> &ResourceBase;

    fn base_mut(&mut self) -> &mut ResourceBase;

    /// Declared tasks in phase order; at most one per kind
    fn get_tasks(&self) -> Vec<DeclaredTask>;

    /// Name of the plugin this resource's tasks dispatch to
    fn plugin_name(&self) -> Option<&str> {
        None
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn labels(&self) -> &Labels {
        self.base().labels()
    }

    fn status(&self) -> i32 {
        self.base().status()
    }

    /// The declared task of the given kind, if any
    fn task_for(&self, kind: TaskKind) -> Option<DeclaredTask> {
        self.get_tasks().into_iter().find(|task| task.kind == kind)
    }
}

/// A list given either as a YAML sequence or a comma separated string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let items: Vec<String> = match Raw::deserialize(deserializer)? {
            Raw::One(value) => value.split(',').map(|s| s.trim().to_string()).collect(),
            Raw::Many(values) => values.into_iter().map(|s| s.trim().to_string()).collect(),
        };
        Ok(StringList(items.into_iter().filter(|s| !s.is_empty()).collect()))
    }
}

#[cfg(test)]
mod tests;
