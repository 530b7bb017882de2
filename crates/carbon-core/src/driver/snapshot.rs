//! Results snapshot: `<RESULTS_FOLDER>/results.yml`, written before and after a run.
use std::path::PathBuf;

use serde::Serialize;

use crate::kernel::constants::RESULTS_FILE;
use crate::resources::Scenario;
use crate::storage::error::{StorageResult, StorageSystemError};
use crate::storage::{Config, StorageProvider};

#[derive(Serialize)]
struct Snapshot<'a> {
    scenario: &'a Scenario,
    passed_tasks: Vec<String>,
    failed_tasks: Vec<String>,
}

/// Serialize the scenario tree and its task ledger to YAML
pub fn render_snapshot(scenario: &Scenario) -> StorageResult<String> {
    let ledger = scenario.ledger().snapshot();
    let snapshot = Snapshot {
        scenario,
        passed_tasks: ledger.passed().iter().map(ToString::to_string).collect(),
        failed_tasks: ledger.failed().iter().map(ToString::to_string).collect(),
    };
    serde_yaml::to_string(&snapshot).map_err(|e| StorageSystemError::SerializationError {
        format: "yaml".into(),
        source: Box::new(e),
    })
}

/// Write the snapshot into the results folder and return its path
pub fn write_snapshot(storage: &dyn StorageProvider, config: &Config, scenario: &Scenario) -> StorageResult<PathBuf> {
    let path = config.results_folder().join(RESULTS_FILE);
    storage.write_string(&path, &render_snapshot(scenario)?)?;
    log::debug!("Scenario snapshot written to {}", path.display());
    Ok(path)
}
