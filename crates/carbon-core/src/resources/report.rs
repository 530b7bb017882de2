use serde::{Deserialize, Serialize};

use crate::plugin_system::traits::ImportResult;
use crate::resources::asset::ProviderSpec;
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::{Resource, ResourceBase, ResourceContext, ResourceType, StringList};
use crate::task::{DeclaredTask, Method, TaskKind};

fn default_true() -> bool {
    true
}

/// A report as written in a scenario descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ReportDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: StringList,
    pub executes: Option<StringList>,
    pub importer: Option<String>,
    pub provider: Option<ProviderSpec>,
    #[serde(default = "default_true")]
    pub do_import: bool,
    pub concurrent: Option<bool>,
}

/// Artifact import for the output of one or more executes
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(flatten)]
    base: ResourceBase,
    executes: Vec<String>,
    importer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderSpec>,
    do_import: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    import_results: Vec<ImportResult>,
}

impl Report {
    pub fn from_descriptor(descriptor: ReportDescriptor, context: &ResourceContext) -> ResourceResult<Self> {
        let name = match descriptor.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Report,
                    resource: "<unnamed>".into(),
                    field: "name".into(),
                });
            }
        };
        let executes = match descriptor.executes {
            Some(executes) if !executes.is_empty() => executes.into_vec(),
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Report,
                    resource: name,
                    field: "executes".into(),
                });
            }
        };
        let importer = match (descriptor.importer, &descriptor.provider) {
            (Some(importer), _) => importer,
            (None, Some(provider)) => provider.name.clone(),
            (None, None) => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Report,
                    resource: name,
                    field: "importer or provider".into(),
                });
            }
        };
        if let Some(credential) = descriptor.provider.as_ref().and_then(|p| p.credential.as_ref()) {
            if context.config().credential(credential).is_none() {
                return Err(ResourceError::UnknownCredential {
                    kind: ResourceType::Report,
                    resource: name,
                    credential: credential.clone(),
                });
            }
        }

        let base = ResourceBase::new(name, context)
            .with_description(descriptor.description)
            .with_labels(descriptor.labels.into_vec())
            .with_concurrent(descriptor.concurrent);

        Ok(Self {
            base,
            executes,
            importer,
            provider: descriptor.provider,
            do_import: descriptor.do_import,
            import_results: Vec::new(),
        })
    }

    /// Execute references as declared
    pub fn executes(&self) -> &[String] {
        &self.executes
    }

    pub fn importer(&self) -> &str {
        &self.importer
    }

    pub fn provider(&self) -> Option<&ProviderSpec> {
        self.provider.as_ref()
    }

    pub fn do_import(&self) -> bool {
        self.do_import
    }

    pub fn import_results(&self) -> &[ImportResult] {
        &self.import_results
    }

    pub fn set_import_results(&mut self, results: Vec<ImportResult>) {
        self.import_results = results;
    }

    pub fn mark_passed(&mut self) {
        self.base.mark_passed();
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.base.mark_failed(trace);
    }
}

impl Resource for Report {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Report
    }

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn get_tasks(&self) -> Vec<DeclaredTask> {
        // With do_import off the report task still runs, as a no-op
        let import = if self.do_import { vec![Method::ImportArtifacts] } else { Vec::new() };
        vec![
            DeclaredTask::new(TaskKind::Validate, vec![Method::Validate]),
            DeclaredTask::new(TaskKind::Report, import),
        ]
    }

    fn plugin_name(&self) -> Option<&str> {
        Some(&self.importer)
    }
}
