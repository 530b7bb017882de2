//! Scenario descriptor loading.
//!
//! Maps a parsed YAML descriptor onto typed resources and resolves `include`
//! entries into child scenarios. Schema validation proper happens elsewhere;
//! this only enforces what the resource constructors need.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::resources::action::ActionDescriptor;
use crate::resources::asset::AssetDescriptor;
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::execute::ExecuteDescriptor;
use crate::resources::notification::NotificationDescriptor;
use crate::resources::report::ReportDescriptor;
use crate::resources::{
    Action, Asset, Execute, Notification, Report, Resource, ResourceContext, ResourceType, Scenario, StringList,
};
use crate::storage::StorageProvider;

/// Top-level layout of a scenario descriptor
#[derive(Debug, Deserialize)]
struct ScenarioDescriptor {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    include: StringList,
    resource_check: Option<Value>,
    #[serde(default)]
    provision: Vec<AssetDescriptor>,
    #[serde(default)]
    orchestrate: Vec<ActionDescriptor>,
    #[serde(default)]
    execute: Vec<ExecuteDescriptor>,
    #[serde(default)]
    report: Vec<ReportDescriptor>,
    #[serde(default)]
    notifications: Vec<NotificationDescriptor>,
}

/// Builds [`Scenario`] trees from descriptor files
pub struct ScenarioLoader {
    storage: Arc<dyn StorageProvider>,
    context: ResourceContext,
}

impl ScenarioLoader {
    pub fn new(storage: Arc<dyn StorageProvider>, context: ResourceContext) -> Self {
        Self { storage, context }
    }

    /// Load a descriptor file and everything it includes
    pub fn load(&self, path: &Path) -> ResourceResult<Scenario> {
        let mut chain = Vec::new();
        self.load_file(path, &mut chain)
    }

    /// Load a descriptor held in memory. Includes resolve against the workspace.
    pub fn load_str(&self, content: &str) -> ResourceResult<Scenario> {
        let origin = self.context.workspace().join("<inline>");
        let mut chain = Vec::new();
        self.build(content, &origin, &mut chain)
    }

    fn load_file(&self, path: &Path, chain: &mut Vec<PathBuf>) -> ResourceResult<Scenario> {
        let identity = self.storage.canonicalize(path)?;
        if chain.contains(&identity) {
            let mut cycle = chain.clone();
            cycle.push(identity);
            return Err(ResourceError::IncludeCycle { chain: cycle });
        }

        log::debug!("Loading scenario descriptor {}", path.display());
        let content = self.storage.read_to_string(path)?;

        chain.push(identity);
        let scenario = self.build(&content, path, chain);
        chain.pop();

        Ok(scenario?.with_path(path))
    }

    fn build(&self, content: &str, origin: &Path, chain: &mut Vec<PathBuf>) -> ResourceResult<Scenario> {
        let descriptor: ScenarioDescriptor =
            serde_yaml::from_str(content).map_err(|source| ResourceError::Descriptor {
                path: origin.to_path_buf(),
                source,
            })?;

        let name = match descriptor.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Scenario,
                    resource: origin.display().to_string(),
                    field: "name".into(),
                });
            }
        };

        let mut scenario = Scenario::new(name, &self.context)
            .with_description(descriptor.description)
            .with_resource_check(descriptor.resource_check);

        for asset in descriptor.provision {
            scenario.add_asset(Asset::from_descriptor(asset, &self.context)?)?;
        }
        for action in descriptor.orchestrate {
            scenario.add_action(Action::from_descriptor(action, &self.context)?)?;
        }
        for execute in descriptor.execute {
            scenario.add_execute(Execute::from_descriptor(execute, &self.context)?)?;
        }
        for report in descriptor.report {
            scenario.add_report(Report::from_descriptor(report, &self.context)?)?;
        }
        for notification in descriptor.notifications {
            scenario.add_notification(Notification::from_descriptor(notification, &self.context)?)?;
        }

        let base_dir = origin.parent().map(Path::to_path_buf).unwrap_or_default();
        for include in descriptor.include.into_vec() {
            let include_path = base_dir.join(&include);
            let child = self.load_file(&include_path, chain)?;
            log::debug!(
                "Scenario '{}' includes '{}' from {}",
                scenario.name(),
                child.name(),
                include_path.display()
            );
            scenario.add_child(child);
        }

        Ok(scenario)
    }
}
