use std::collections::HashMap;
use std::sync::Arc;

use semver::Version;

use crate::kernel::constants::API_VERSION;
use crate::plugin_system::PluginClass;
use crate::plugin_system::builtin::StaticProvisioner;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{Executor, Importer, Notifier, Orchestrator, Plugin, Provisioner, ResourceChecker};
use crate::plugin_system::version::VersionRange;

type RegistryResult<T> = Result<T, PluginSystemError>;

/// Plugins by class, keyed by the name resources refer to them with.
///
/// Filled once at startup and shared read-only (`Arc<PluginRegistry>`) with
/// every worker of a run.
pub struct PluginRegistry {
    api_version: Version,
    provisioners: HashMap<String, Arc<dyn Provisioner>>,
    orchestrators: HashMap<String, Arc<dyn Orchestrator>>,
    executors: HashMap<String, Arc<dyn Executor>>,
    importers: HashMap<String, Arc<dyn Importer>>,
    notifiers: HashMap<String, Arc<dyn Notifier>>,
    resource_checkers: HashMap<String, Arc<dyn ResourceChecker>>,
}

impl PluginRegistry {
    /// Create an empty registry for the given API version
    pub fn new(api_version: Version) -> Self {
        Self {
            api_version,
            provisioners: HashMap::new(),
            orchestrators: HashMap::new(),
            executors: HashMap::new(),
            importers: HashMap::new(),
            notifiers: HashMap::new(),
            resource_checkers: HashMap::new(),
        }
    }

    /// A registry holding the built-in plugins
    pub fn with_builtins() -> RegistryResult<Self> {
        let mut registry = Self::default();
        registry.register_provisioner(Arc::new(StaticProvisioner))?;
        Ok(registry)
    }

    pub fn api_version(&self) -> &Version {
        &self.api_version
    }

    pub fn register_provisioner(&mut self, plugin: Arc<dyn Provisioner>) -> RegistryResult<()> {
        insert(&mut self.provisioners, plugin, PluginClass::Provisioner, &self.api_version)
    }

    pub fn register_orchestrator(&mut self, plugin: Arc<dyn Orchestrator>) -> RegistryResult<()> {
        insert(&mut self.orchestrators, plugin, PluginClass::Orchestrator, &self.api_version)
    }

    pub fn register_executor(&mut self, plugin: Arc<dyn Executor>) -> RegistryResult<()> {
        insert(&mut self.executors, plugin, PluginClass::Executor, &self.api_version)
    }

    pub fn register_importer(&mut self, plugin: Arc<dyn Importer>) -> RegistryResult<()> {
        insert(&mut self.importers, plugin, PluginClass::Importer, &self.api_version)
    }

    pub fn register_notifier(&mut self, plugin: Arc<dyn Notifier>) -> RegistryResult<()> {
        insert(&mut self.notifiers, plugin, PluginClass::Notifier, &self.api_version)
    }

    pub fn register_resource_checker(&mut self, plugin: Arc<dyn ResourceChecker>) -> RegistryResult<()> {
        insert(&mut self.resource_checkers, plugin, PluginClass::ResourceChecker, &self.api_version)
    }

    pub fn provisioner(&self, name: &str) -> RegistryResult<Arc<dyn Provisioner>> {
        lookup(&self.provisioners, name, PluginClass::Provisioner)
    }

    pub fn orchestrator(&self, name: &str) -> RegistryResult<Arc<dyn Orchestrator>> {
        lookup(&self.orchestrators, name, PluginClass::Orchestrator)
    }

    pub fn executor(&self, name: &str) -> RegistryResult<Arc<dyn Executor>> {
        lookup(&self.executors, name, PluginClass::Executor)
    }

    pub fn importer(&self, name: &str) -> RegistryResult<Arc<dyn Importer>> {
        lookup(&self.importers, name, PluginClass::Importer)
    }

    pub fn notifier(&self, name: &str) -> RegistryResult<Arc<dyn Notifier>> {
        lookup(&self.notifiers, name, PluginClass::Notifier)
    }

    /// Resource checkers in name order
    pub fn resource_checkers(&self) -> Vec<Arc<dyn ResourceChecker>> {
        let mut names: Vec<&String> = self.resource_checkers.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.resource_checkers.get(name).cloned())
            .collect()
    }

    /// Check if a plugin of the given class is registered under `name`
    pub fn has_plugin(&self, class: PluginClass, name: &str) -> bool {
        match class {
            PluginClass::Provisioner => self.provisioners.contains_key(name),
            PluginClass::Orchestrator => self.orchestrators.contains_key(name),
            PluginClass::Executor => self.executors.contains_key(name),
            PluginClass::Importer => self.importers.contains_key(name),
            PluginClass::Notifier => self.notifiers.contains_key(name),
            PluginClass::ResourceChecker => self.resource_checkers.contains_key(name),
        }
    }

    /// Sorted plugin names of one class
    pub fn plugin_names(&self, class: PluginClass) -> Vec<String> {
        let mut names: Vec<String> = match class {
            PluginClass::Provisioner => self.provisioners.keys().cloned().collect(),
            PluginClass::Orchestrator => self.orchestrators.keys().cloned().collect(),
            PluginClass::Executor => self.executors.keys().cloned().collect(),
            PluginClass::Importer => self.importers.keys().cloned().collect(),
            PluginClass::Notifier => self.notifiers.keys().cloned().collect(),
            PluginClass::ResourceChecker => self.resource_checkers.keys().cloned().collect(),
        };
        names.sort();
        names
    }

    /// The concurrency a notifier declares, if registered and declared
    pub fn notifier_concurrency(&self, name: &str) -> Option<bool> {
        self.notifiers.get(name).and_then(|plugin| plugin.concurrent())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(API_VERSION)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("api_version", &self.api_version)
            .field("provisioners", &self.plugin_names(PluginClass::Provisioner))
            .field("orchestrators", &self.plugin_names(PluginClass::Orchestrator))
            .field("executors", &self.plugin_names(PluginClass::Executor))
            .field("importers", &self.plugin_names(PluginClass::Importer))
            .field("notifiers", &self.plugin_names(PluginClass::Notifier))
            .field("resource_checkers", &self.plugin_names(PluginClass::ResourceChecker))
            .finish()
    }
}

fn insert<P: Plugin + ?Sized>(
    plugins: &mut HashMap<String, Arc<P>>,
    plugin: Arc<P>,
    class: PluginClass,
    api_version: &Version,
) -> RegistryResult<()> {
    let name = plugin.name().to_string();
    if plugins.contains_key(&name) {
        return Err(PluginSystemError::DuplicatePlugin { class, name });
    }

    let constraints: Vec<String> = plugin
        .compatible_api_versions()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut compatible = false;
    for constraint in &constraints {
        let range = VersionRange::from_constraint(constraint).map_err(|source| PluginSystemError::InvalidApiRange {
            class,
            name: name.clone(),
            source,
        })?;
        if range.includes(api_version) {
            compatible = true;
            break;
        }
    }
    if !compatible {
        return Err(PluginSystemError::IncompatibleApiVersion {
            class,
            name,
            api_version: api_version.to_string(),
            supported: constraints.join(", "),
        });
    }

    log::debug!("Registered {} plugin '{}'", class, name);
    plugins.insert(name, plugin);
    Ok(())
}

fn lookup<P: ?Sized>(plugins: &HashMap<String, Arc<P>>, name: &str, class: PluginClass) -> RegistryResult<Arc<P>> {
    plugins.get(name).cloned().ok_or_else(|| PluginSystemError::PluginNotFound {
        class,
        name: name.to_string(),
    })
}
