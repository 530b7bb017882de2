
use std::path::PathBuf;
use std::sync::Arc;

use crate::resources::{ResourceContext, Scenario, ScenarioLoader};
use crate::storage::{Config, LocalStorageProvider};

/// Parse an inline descriptor with the given settings
pub(super) fn load_with(config: Config, yaml: &str) -> Scenario {
    let context = ResourceContext::new(Arc::new(config), "/tmp/carbon-tests/data");
    ScenarioLoader::new(Arc::new(LocalStorageProvider::new(PathBuf::from("/"))), context)
        .load_str(yaml)
        .unwrap()
}

pub(super) fn load(yaml: &str) -> Scenario {
    load_with(Config::default(), yaml)
}
