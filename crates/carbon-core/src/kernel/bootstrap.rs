use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::driver::ScenarioDriver;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::PluginRegistry;
use crate::resources::{ResourceContext, Scenario, ScenarioLoader};
use crate::storage::{Config, LocalStorageProvider, StorageProvider};

/// Short random hex id, used for run folders and inventory file names
pub fn generate_uid() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// Application handle: the settings, plugins, and storage of one process run.
///
/// Every scenario loaded through it shares the same [`Config`] and run data
/// folder `<DATA_FOLDER>/<uid>`.
pub struct Carbon {
    config: Arc<Config>,
    registry: Arc<PluginRegistry>,
    storage: Arc<dyn StorageProvider>,
    uid: String,
    data_folder: PathBuf,
}

impl Carbon {
    /// Create a handle working on the local filesystem, relative to the workspace
    pub fn new(config: Config, registry: PluginRegistry) -> Self {
        let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(config.workspace().to_path_buf()));
        Self::with_storage(config, registry, storage)
    }

    pub fn with_storage(config: Config, registry: PluginRegistry, storage: Arc<dyn StorageProvider>) -> Self {
        let uid = generate_uid();
        let data_folder = config.data_folder().join(&uid);
        log::info!("Initializing {} run {}", constants::APP_NAME, uid);
        log::debug!("Run data folder: {}", data_folder.display());
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            storage,
            uid,
            data_folder,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// Context every resource of this run is built with
    pub fn resource_context(&self) -> ResourceContext {
        ResourceContext::new(Arc::clone(&self.config), self.data_folder.clone())
    }

    pub fn loader(&self) -> ScenarioLoader {
        ScenarioLoader::new(Arc::clone(&self.storage), self.resource_context())
    }

    /// Load a scenario descriptor and its includes
    pub fn load_scenario(&self, path: &Path) -> Result<Scenario> {
        Ok(self.loader().load(path)?)
    }

    /// A driver bound to this run's plugins, storage, and data folder
    pub fn driver(&self) -> ScenarioDriver {
        ScenarioDriver::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            Arc::clone(&self.storage),
            &self.uid,
            self.data_folder.clone(),
        )
    }
}

impl std::fmt::Debug for Carbon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Carbon")
            .field("uid", &self.uid)
            .field("data_folder", &self.data_folder)
            .field("registry", &self.registry)
            .finish()
    }
}
