use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plugin_system::error::PluginError;
use crate::resources::{Action, Asset, Execute, Notification, Report};
use crate::storage::{Config, Credential};
use crate::task::{HostSet, RunSummary};

/// Result type of every plugin entry point
pub type PluginResult<T> = Result<T, PluginError>;

/// Everything a plugin call may read besides the resource itself
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub config: Arc<Config>,
    pub workspace: PathBuf,
    /// Run data folder, `<DATA_FOLDER>/<uid>`
    pub data_folder: PathBuf,
    pub results_folder: PathBuf,
    pub artifacts_folder: PathBuf,
    pub master_inventory: PathBuf,
    /// Inventory scoped to this task's hosts, present for orchestrate and execute tasks
    pub unique_inventory: Option<PathBuf>,
    /// The credential table the resource names, if any
    pub credential: Option<Credential>,
}

/// An asset as reported by a provisioner after `create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteAsset {
    pub ip_address: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub ansible_params: Map<String, Value>,
}

impl ConcreteAsset {
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            hostname: None,
            metadata: Map::new(),
            ansible_params: Map::new(),
        }
    }
}

/// What `create` hands back
#[derive(Debug, Clone, PartialEq)]
pub enum CreateResult {
    /// Static or no-op provisioning, the asset is unchanged
    Nothing,
    One(ConcreteAsset),
    /// More than one element expands the logical asset
    Many(Vec<ConcreteAsset>),
}

impl CreateResult {
    pub fn into_vec(self) -> Vec<ConcreteAsset> {
        match self {
            CreateResult::Nothing => Vec::new(),
            CreateResult::One(asset) => vec![asset],
            CreateResult::Many(assets) => assets,
        }
    }
}

/// What an executor reports after a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteOutput {
    /// Folder (absolute or relative to the artifacts folder) to file patterns
    #[serde(default)]
    pub artifact_locations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// Outcome of importing one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub artifact: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// Identity every plugin declares
pub trait Plugin: Send + Sync {
    /// Name resources refer to the plugin by
    fn name(&self) -> &str;

    /// Semver ranges of the core API this plugin works with
    fn compatible_api_versions(&self) -> Vec<&str> {
        vec!["^0.1"]
    }

    /// Whether notifications sent through this plugin may run in parallel. Only
    /// consulted for notifiers; other task kinds take their mode from the resource
    /// and settings. `None` keeps the task default.
    fn concurrent(&self) -> Option<bool> {
        None
    }
}

pub trait Provisioner: Plugin {
    fn validate(&self, _asset: &Asset, _context: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    fn authenticate(&self, _asset: &Asset, _context: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    fn create(&self, asset: &Asset, context: &PluginContext) -> PluginResult<CreateResult>;

    fn delete(&self, asset: &Asset, context: &PluginContext) -> PluginResult<()>;
}

pub trait Orchestrator: Plugin {
    fn validate(&self, _action: &Action, _context: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    fn run(&self, action: &Action, hosts: &HostSet, context: &PluginContext) -> PluginResult<()>;
}

pub trait Executor: Plugin {
    fn validate(&self, _execute: &Execute, _context: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    fn run(&self, execute: &Execute, hosts: &HostSet, context: &PluginContext) -> PluginResult<ExecuteOutput>;
}

pub trait Importer: Plugin {
    fn validate(&self, _report: &Report, _context: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    fn import_artifacts(
        &self,
        report: &Report,
        executes: &[Execute],
        context: &PluginContext,
    ) -> PluginResult<Vec<ImportResult>>;
}

pub trait Notifier: Plugin {
    fn validate(&self, _notification: &Notification, _context: &PluginContext) -> PluginResult<()> {
        Ok(())
    }

    fn notify(&self, notification: &Notification, summary: &RunSummary, context: &PluginContext) -> PluginResult<()>;
}

/// Pre-flight health check of the external services a scenario depends on
pub trait ResourceChecker: Plugin {
    fn check(&self, scenario: &str, resource_check: &Value, context: &PluginContext) -> PluginResult<()>;
}
