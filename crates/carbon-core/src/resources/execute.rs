use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kernel::constants::DEFAULT_EXECUTOR;
use crate::plugin_system::traits::ExecuteOutput;
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::{Resource, ResourceBase, ResourceContext, ResourceType, StringList};
use crate::task::{DeclaredTask, Method, TaskKind};

/// An execute as written in a scenario descriptor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: StringList,
    pub hosts: Option<StringList>,
    pub executor: Option<String>,
    pub concurrent: Option<bool>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Test execution against a set of assets
#[derive(Debug, Clone, Serialize)]
pub struct Execute {
    #[serde(flatten)]
    base: ResourceBase,
    hosts: Vec<String>,
    executor: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    params: Map<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    artifact_locations: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    artifacts: Vec<String>,
}

impl Execute {
    pub fn from_descriptor(descriptor: ExecuteDescriptor, context: &ResourceContext) -> ResourceResult<Self> {
        let name = match descriptor.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Execute,
                    resource: "<unnamed>".into(),
                    field: "name".into(),
                });
            }
        };
        let hosts = match descriptor.hosts {
            Some(hosts) if !hosts.is_empty() => hosts.into_vec(),
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Execute,
                    resource: name,
                    field: "hosts".into(),
                });
            }
        };

        let base = ResourceBase::new(name, context)
            .with_description(descriptor.description)
            .with_labels(descriptor.labels.into_vec())
            .with_concurrent(descriptor.concurrent);

        Ok(Self {
            base,
            hosts,
            executor: descriptor.executor.unwrap_or_else(|| DEFAULT_EXECUTOR.to_string()),
            params: descriptor.params,
            artifact_locations: BTreeMap::new(),
            artifacts: Vec::new(),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn executor(&self) -> &str {
        &self.executor
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Folder to file patterns, as reported by the executor
    pub fn artifact_locations(&self) -> &BTreeMap<String, Vec<String>> {
        &self.artifact_locations
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Store what the executor reported after a run
    pub fn apply_output(&mut self, output: &ExecuteOutput) {
        for (location, patterns) in &output.artifact_locations {
            let entry = self.artifact_locations.entry(location.clone()).or_default();
            for pattern in patterns {
                if !entry.contains(pattern) {
                    entry.push(pattern.clone());
                }
            }
        }
        for artifact in &output.artifacts {
            if !self.artifacts.contains(artifact) {
                self.artifacts.push(artifact.clone());
            }
        }
    }

    pub fn mark_passed(&mut self) {
        self.base.mark_passed();
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.base.mark_failed(trace);
    }
}

impl Resource for Execute {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Execute
    }

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn get_tasks(&self) -> Vec<DeclaredTask> {
        vec![
            DeclaredTask::new(TaskKind::Validate, vec![Method::Validate]),
            DeclaredTask::new(TaskKind::Execute, vec![Method::Run]),
        ]
    }

    fn plugin_name(&self) -> Option<&str> {
        Some(&self.executor)
    }
}
