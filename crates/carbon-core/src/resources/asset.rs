use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kernel::constants::STATIC_PROVISIONER;
use crate::plugin_system::traits::ConcreteAsset;
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::{Resource, ResourceBase, ResourceContext, ResourceType, StringList};
use crate::task::{DeclaredTask, Method, TaskKind};

fn default_count() -> u32 {
    1
}

/// Provider block of a dynamic asset, or of a report's import target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Provider-specific fields, opaque to the core
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// An asset as written in a scenario descriptor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: StringList,
    pub groups: Option<StringList>,
    pub role: Option<String>,
    pub ip_address: Option<String>,
    pub provider: Option<ProviderSpec>,
    pub provisioner: Option<String>,
    #[serde(default)]
    pub ansible_params: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub concurrent: Option<bool>,
}

/// A machine or infrastructure element
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    #[serde(flatten)]
    base: ResourceBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderSpec>,
    provisioner: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    ansible_params: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expanded_from: Option<String>,
}

impl Asset {
    pub fn from_descriptor(descriptor: AssetDescriptor, context: &ResourceContext) -> ResourceResult<Self> {
        let name = match descriptor.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Asset,
                    resource: "<unnamed>".into(),
                    field: "name".into(),
                });
            }
        };

        let groups = descriptor.groups.map(StringList::into_vec).unwrap_or_default();
        if !groups.is_empty() && descriptor.role.is_some() {
            return Err(ResourceError::ConflictingFields {
                kind: ResourceType::Asset,
                resource: name,
                first: "groups".into(),
                second: "role".into(),
            });
        }

        let provisioner = match (&descriptor.provider, &descriptor.ip_address) {
            (Some(_), Some(_)) => {
                return Err(ResourceError::ConflictingFields {
                    kind: ResourceType::Asset,
                    resource: name,
                    first: "provider".into(),
                    second: "ip_address".into(),
                });
            }
            (None, None) => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Asset,
                    resource: name,
                    field: "provider or ip_address".into(),
                });
            }
            (Some(provider), None) => {
                if provider.count == 0 {
                    return Err(ResourceError::InvalidField {
                        kind: ResourceType::Asset,
                        resource: name,
                        field: "provider.count".into(),
                        reason: "must be at least 1".into(),
                    });
                }
                if let Some(credential) = &provider.credential {
                    if context.config().credential(credential).is_none() {
                        return Err(ResourceError::UnknownCredential {
                            kind: ResourceType::Asset,
                            resource: name,
                            credential: credential.clone(),
                        });
                    }
                }
                descriptor.provisioner.clone().unwrap_or_else(|| provider.name.clone())
            }
            (None, Some(_)) => descriptor
                .provisioner
                .clone()
                .unwrap_or_else(|| STATIC_PROVISIONER.to_string()),
        };

        let base = ResourceBase::new(name, context)
            .with_description(descriptor.description)
            .with_labels(descriptor.labels.into_vec())
            .with_concurrent(descriptor.concurrent);

        Ok(Self {
            base,
            ip_address: descriptor.ip_address.map(|ip| ip.trim().to_string()),
            provider: descriptor.provider,
            provisioner,
            groups,
            role: descriptor.role,
            ansible_params: descriptor.ansible_params,
            metadata: descriptor.metadata,
            expanded_from: None,
        })
    }

    /// Static assets carry their address up front and have no provider
    pub fn is_static(&self) -> bool {
        self.provider.is_none()
    }

    /// Concrete assets have an address and may go into an inventory
    pub fn is_concrete(&self) -> bool {
        self.ip_address.as_deref().is_some_and(|ip| !ip.is_empty())
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn provider(&self) -> Option<&ProviderSpec> {
        self.provider.as_ref()
    }

    pub fn provisioner(&self) -> &str {
        &self.provisioner
    }

    pub fn count(&self) -> u32 {
        self.provider.as_ref().map_or(1, |p| p.count)
    }

    pub fn credential(&self) -> Option<&str> {
        self.provider.as_ref().and_then(|p| p.credential.as_deref())
    }

    /// Inventory groups: `groups`, else the legacy `role`
    pub fn group_names(&self) -> Vec<&str> {
        match &self.role {
            Some(role) if self.groups.is_empty() => vec![role.as_str()],
            _ => self.groups.iter().map(String::as_str).collect(),
        }
    }

    pub fn ansible_params(&self) -> &Map<String, Value> {
        &self.ansible_params
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Name of the logical asset this one was expanded from
    pub fn expanded_from(&self) -> Option<&str> {
        self.expanded_from.as_deref()
    }

    /// Record what the provisioner reported for this asset
    pub fn apply_concrete(&mut self, concrete: &ConcreteAsset) {
        self.ip_address = Some(concrete.ip_address.clone());
        if let Some(hostname) = &concrete.hostname {
            self.metadata.insert("hostname".into(), Value::String(hostname.clone()));
        }
        for (key, value) in &concrete.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
        for (key, value) in &concrete.ansible_params {
            self.ansible_params.insert(key.clone(), value.clone());
        }
    }

    /// Split this logical asset into one child per concrete asset, named `<name>_<i>`
    pub fn expand(&self, concrete: &[ConcreteAsset]) -> Vec<Asset> {
        concrete
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let mut child = Asset {
                    base: self.base.renamed(format!("{}_{}", self.name(), index)),
                    expanded_from: Some(self.name().to_string()),
                    ..self.clone()
                };
                if let Some(provider) = child.provider.as_mut() {
                    provider.count = 1;
                }
                child.apply_concrete(item);
                child
            })
            .collect()
    }

    pub fn mark_passed(&mut self) {
        self.base.mark_passed();
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.base.mark_failed(trace);
    }
}

impl Resource for Asset {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Asset
    }

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn get_tasks(&self) -> Vec<DeclaredTask> {
        let provision = if self.is_static() {
            vec![Method::Create]
        } else {
            vec![Method::Authenticate, Method::Create]
        };
        vec![
            DeclaredTask::new(TaskKind::Validate, vec![Method::Validate]),
            DeclaredTask::new(TaskKind::Provision, provision),
            DeclaredTask::new(TaskKind::Cleanup, vec![Method::Delete]),
        ]
    }

    fn plugin_name(&self) -> Option<&str> {
        Some(&self.provisioner)
    }
}
