//! Task outcomes and their write-back.
//!
//! Workers never touch the scenario. Each returns a [`TaskOutcome`] holding
//! the diff its plugin calls produced, and the runner applies the outcomes in
//! pipeline order once every worker has joined.
use crate::plugin_system::error::PluginError;
use crate::plugin_system::traits::{ConcreteAsset, ExecuteOutput, ImportResult};
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::notification::Trigger;
use crate::resources::{Resource, ResourceBase, ResourceKey, ResourceType, Scenario};
use crate::task::{MethodCall, TaskDescriptor, TaskKind, TaskRecord};

/// A change a successful method call asks for
#[derive(Debug, Clone, PartialEq)]
pub enum WriteBack {
    /// `create` returned concrete assets. One is applied in place, more expand the asset.
    Provisioned(Vec<ConcreteAsset>),
    Artifacts(ExecuteOutput),
    Imported(Vec<ImportResult>),
    Dispatched(Trigger),
    /// `delete` succeeded; the host leaves the master inventory
    Deleted,
}

/// How a task ended
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Passed,
    Failed(PluginError),
    /// Not started because the run was cancelled
    Skipped,
}

/// Result of one task, returned by its worker
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub kind: TaskKind,
    pub key: ResourceKey,
    pub record: TaskRecord,
    pub status: TaskStatus,
    pub methods: Vec<MethodCall>,
    pub changes: Vec<WriteBack>,
}

impl TaskOutcome {
    pub fn skipped(task: &TaskDescriptor) -> Self {
        Self::failed_before_start(task, TaskStatus::Skipped)
    }

    pub fn failed_before_start(task: &TaskDescriptor, status: TaskStatus) -> Self {
        Self {
            kind: task.kind,
            key: task.resource.clone(),
            record: task.record(),
            status,
            methods: task.methods.clone(),
            changes: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self.status, TaskStatus::Passed)
    }

    pub fn error(&self) -> Option<&PluginError> {
        match &self.status {
            TaskStatus::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Name of the asset this outcome removed, if any
    pub fn deleted_host(&self) -> Option<&str> {
        (self.key.kind == ResourceType::Asset && self.changes.contains(&WriteBack::Deleted))
            .then_some(self.key.name.as_str())
    }
}

/// Apply one outcome to the scenario: status first, then the recorded changes
pub fn apply(scenario: &mut Scenario, outcome: &TaskOutcome) -> ResourceResult<()> {
    if outcome.status == TaskStatus::Skipped {
        return Ok(());
    }
    let key = &outcome.key;

    match key.kind {
        ResourceType::Scenario => {
            let target = scenario.scope_mut(&key.scope).ok_or_else(|| ResourceError::NotFound {
                kind: ResourceType::Scenario,
                name: key.name.clone(),
            })?;
            set_status(target.base_mut(), &outcome.status);
        }
        ResourceType::Asset => {
            let expanded = {
                let asset = scenario.asset_mut(key)?;
                set_status(asset.base_mut(), &outcome.status);
                let mut expanded = None;
                for change in &outcome.changes {
                    if let WriteBack::Provisioned(concrete) = change {
                        match concrete.as_slice() {
                            [] => {}
                            [single] => asset.apply_concrete(single),
                            many => expanded = Some(asset.expand(many)),
                        }
                    }
                }
                expanded
            };
            if let Some(children) = expanded {
                log::info!(
                    "Asset '{}' expanded into {}",
                    key.name,
                    children.iter().map(|child| child.name()).collect::<Vec<_>>().join(", ")
                );
                if let Err(e) = scenario.replace_asset(key, children) {
                    scenario.asset_mut(key)?.mark_failed(e.to_string());
                    return Err(e);
                }
            }
        }
        ResourceType::Action => {
            let action = scenario.action_mut(key)?;
            let target = if outcome.kind == TaskKind::Cleanup {
                action.cleanup_mut().ok_or_else(|| ResourceError::NotFound {
                    kind: ResourceType::Action,
                    name: format!("{}_cleanup", key.name),
                })?
            } else {
                action
            };
            set_status(target.base_mut(), &outcome.status);
        }
        ResourceType::Execute => {
            let execute = scenario.execute_mut(key)?;
            set_status(execute.base_mut(), &outcome.status);
            for change in &outcome.changes {
                if let WriteBack::Artifacts(output) = change {
                    execute.apply_output(output);
                }
            }
        }
        ResourceType::Report => {
            let report = scenario.report_mut(key)?;
            set_status(report.base_mut(), &outcome.status);
            for change in &outcome.changes {
                if let WriteBack::Imported(results) = change {
                    report.set_import_results(results.clone());
                }
            }
        }
        ResourceType::Notification => {
            let notification = scenario.notification_mut(key)?;
            set_status(notification.base_mut(), &outcome.status);
            for change in &outcome.changes {
                if let WriteBack::Dispatched(trigger) = change {
                    notification.set_dispatched(*trigger);
                }
            }
        }
    }
    Ok(())
}

fn set_status(base: &mut ResourceBase, status: &TaskStatus) {
    match status {
        TaskStatus::Passed => base.mark_passed(),
        TaskStatus::Failed(error) => base.mark_failed(error.traceback.clone()),
        TaskStatus::Skipped => {}
    }
}
