use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kernel::constants::DEFAULT_ORCHESTRATOR;
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::{Resource, ResourceBase, ResourceContext, ResourceType, StringList};
use crate::task::{DeclaredTask, Method, TaskKind};

/// An action as written in a scenario descriptor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: StringList,
    pub hosts: Option<StringList>,
    pub orchestrator: Option<String>,
    pub cleanup: Option<Box<ActionDescriptor>>,
    pub concurrent: Option<bool>,
    /// Orchestrator parameters, opaque to the core
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Configuration work to perform on a set of assets
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    #[serde(flatten)]
    base: ResourceBase,
    hosts: Vec<String>,
    orchestrator: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleanup: Option<Box<Action>>,
}

impl Action {
    pub fn from_descriptor(descriptor: ActionDescriptor, context: &ResourceContext) -> ResourceResult<Self> {
        Self::build(descriptor, context, None)
    }

    fn build(descriptor: ActionDescriptor, context: &ResourceContext, parent: Option<&Action>) -> ResourceResult<Self> {
        let name = match (descriptor.name.map(|n| n.trim().to_string()), parent) {
            (Some(name), _) if !name.is_empty() => name,
            (_, Some(parent)) => format!("{}_cleanup", parent.name()),
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Action,
                    resource: "<unnamed>".into(),
                    field: "name".into(),
                });
            }
        };

        let hosts = match (descriptor.hosts, parent) {
            (Some(hosts), _) if !hosts.is_empty() => hosts.into_vec(),
            (_, Some(parent)) => parent.hosts.clone(),
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Action,
                    resource: name,
                    field: "hosts".into(),
                });
            }
        };

        let orchestrator = descriptor
            .orchestrator
            .or_else(|| parent.map(|p| p.orchestrator.clone()))
            .unwrap_or_else(|| DEFAULT_ORCHESTRATOR.to_string());

        let base = ResourceBase::new(name, context)
            .with_description(descriptor.description)
            .with_labels(descriptor.labels.into_vec())
            .with_concurrent(descriptor.concurrent);

        let mut action = Self {
            base,
            hosts,
            orchestrator,
            params: descriptor.params,
            cleanup: None,
        };

        if let Some(cleanup) = descriptor.cleanup {
            if parent.is_some() {
                return Err(ResourceError::InvalidField {
                    kind: ResourceType::Action,
                    resource: action.name().to_string(),
                    field: "cleanup".into(),
                    reason: "a cleanup action cannot declare its own cleanup".into(),
                });
            }
            let cleanup = Self::build(*cleanup, context, Some(&action))?;
            action.cleanup = Some(Box::new(cleanup));
        }

        Ok(action)
    }

    /// Host references as declared: asset names, group names, or "all"
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn orchestrator(&self) -> &str {
        &self.orchestrator
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn cleanup(&self) -> Option<&Action> {
        self.cleanup.as_deref()
    }

    pub fn cleanup_mut(&mut self) -> Option<&mut Action> {
        self.cleanup.as_deref_mut()
    }

    pub fn mark_passed(&mut self) {
        self.base.mark_passed();
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.base.mark_failed(trace);
    }
}

impl Resource for Action {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Action
    }

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn get_tasks(&self) -> Vec<DeclaredTask> {
        let mut tasks = vec![
            DeclaredTask::new(TaskKind::Validate, vec![Method::Validate]),
            DeclaredTask::new(TaskKind::Orchestrate, vec![Method::Run]),
        ];
        if self.cleanup.is_some() {
            tasks.push(DeclaredTask::new(TaskKind::Cleanup, vec![Method::Run]));
        }
        tasks
    }

    fn plugin_name(&self) -> Option<&str> {
        Some(&self.orchestrator)
    }
}
