//! # Carbon Core Task Runner
//!
//! Executes one [`Pipeline`]:
//!
//! - tasks marked concurrent run first, on a worker pool of
//!   `min(len, forks)` blocking threads (`spawn_blocking` bounded by a
//!   semaphore), and all of them finish before any serial task starts;
//! - serial tasks then run one at a time in pipeline order;
//! - within a task the methods run in order and the first error ends it.
//!
//! Plugin errors never escape a worker: the task is recorded as failed in the
//! scenario ledger and the pipeline carries on. Outcomes are written back to
//! the scenario after the workers join. Provision pipelines then refresh the
//! master inventory, and cleanup pipelines remove the hosts they deleted.
pub mod outcome;

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::driver::CancelFlag;
use crate::inventory::Inventory;
use crate::kernel::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::pipeline::builder::effective_assets;
use crate::plugin_system::error::{PluginError, PluginErrorKind, PluginSystemError};
use crate::plugin_system::traits::{PluginContext, PluginResult};
use crate::plugin_system::PluginRegistry;
use crate::resources::{Asset, Resource, Scenario, SharedLedger};
use crate::storage::Config;
use crate::task::{HostSet, Method, MethodReturn, TaskDescriptor, TaskKind, TaskPayload, TaskRecord};

pub use outcome::{TaskOutcome, TaskStatus, WriteBack};

/// What a pipeline run did
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub name: String,
    pub kind: TaskKind,
    pub passed: Vec<TaskRecord>,
    pub failed: Vec<TaskRecord>,
    pub skipped: Vec<TaskRecord>,
    pub cancelled: bool,
}

impl PipelineReport {
    fn new(pipeline: &Pipeline) -> Self {
        Self {
            name: pipeline.name().to_string(),
            kind: pipeline.kind(),
            passed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// Runs pipelines against the plugin registry
#[derive(Clone)]
pub struct TaskRunner {
    registry: Arc<PluginRegistry>,
    config: Arc<Config>,
    inventory: Arc<Inventory>,
    data_folder: PathBuf,
    cancel: CancelFlag,
}

impl TaskRunner {
    pub fn new(
        registry: Arc<PluginRegistry>,
        config: Arc<Config>,
        inventory: Arc<Inventory>,
        data_folder: impl Into<PathBuf>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            registry,
            config,
            inventory,
            data_folder: data_folder.into(),
            cancel,
        }
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    /// Run a pipeline and write its outcomes back into `scenario`.
    ///
    /// Returns `Err` only for failures outside plugin code: a master inventory
    /// that cannot be written after provision.
    pub async fn run(&self, scenario: &mut Scenario, pipeline: Pipeline) -> Result<PipelineReport> {
        let mut report = PipelineReport::new(&pipeline);
        let kind = pipeline.kind();
        if pipeline.is_empty() {
            log::debug!("Pipeline '{}' is empty, nothing to run", pipeline.name());
            return Ok(report);
        }
        log::info!("Running {} pipeline: {} task(s)", pipeline.name(), pipeline.len());

        // Cleanup and notifications still run after a cancel
        let honours_cancel = kind.is_phase() && kind != TaskKind::Cleanup;
        let worker = Arc::new(Worker {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            inventory: Arc::clone(&self.inventory),
            data_folder: self.data_folder.clone(),
            ledger: scenario.ledger().clone(),
        });

        let (parallel, serial): (Vec<TaskDescriptor>, Vec<TaskDescriptor>) =
            pipeline.into_tasks().into_iter().partition(|task| task.concurrent);
        let mut outcomes = Vec::with_capacity(parallel.len() + serial.len());

        if !parallel.is_empty() {
            let pool_size = parallel.len().min(self.config.forks()).max(1);
            log::debug!("Dispatching {} parallel task(s) on {} worker(s)", parallel.len(), pool_size);
            let permits = Arc::new(Semaphore::new(pool_size));
            let jobs = parallel.into_iter().map(|task| {
                let permits = Arc::clone(&permits);
                let worker = Arc::clone(&worker);
                let cancel = self.cancel.clone();
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return TaskOutcome::skipped(&task);
                    };
                    if honours_cancel && cancel.is_raised() {
                        return TaskOutcome::skipped(&task);
                    }
                    dispatch(worker, task).await
                }
            });
            outcomes.extend(join_all(jobs).await);
        }

        for task in serial {
            if honours_cancel && self.cancel.is_raised() {
                outcomes.push(TaskOutcome::skipped(&task));
                continue;
            }
            outcomes.push(dispatch(Arc::clone(&worker), task).await);
        }

        let mut deleted = Vec::new();
        for outcome in &outcomes {
            match &outcome.status {
                TaskStatus::Passed => report.passed.push(outcome.record.clone()),
                TaskStatus::Failed(_) => report.failed.push(outcome.record.clone()),
                TaskStatus::Skipped => report.skipped.push(outcome.record.clone()),
            }
            if let Err(e) = outcome::apply(scenario, outcome) {
                log::warn!("Could not record the result of {}: {}", outcome.record, e);
            }
            if let Some(host) = outcome.deleted_host() {
                deleted.push(host.to_string());
            }
        }
        report.cancelled = !report.skipped.is_empty();
        if report.cancelled {
            log::warn!("{} task(s) of '{}' not started, run cancelled", report.skipped.len(), report.name);
        }

        match kind {
            TaskKind::Provision => self.refresh_master(scenario).await?,
            TaskKind::Cleanup if !deleted.is_empty() => self.remove_hosts(deleted).await,
            _ => {}
        }

        log::info!(
            "Pipeline '{}' finished: {} passed, {} failed",
            report.name,
            report.passed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Write every concrete asset of the scenario into the master inventory
    async fn refresh_master(&self, scenario: &Scenario) -> Result<()> {
        let hosts: Vec<Asset> = effective_assets(scenario)
            .into_iter()
            .filter(|asset| asset.is_concrete())
            .cloned()
            .collect();
        if hosts.is_empty() {
            return Ok(());
        }
        let inventory = Arc::clone(&self.inventory);
        let path = tokio::task::spawn_blocking(move || inventory.create_master(&hosts))
            .await
            .map_err(|e| Error::Other(format!("master inventory writer panicked: {}", e)))??;
        log::info!("Master inventory written to {}", path.display());
        Ok(())
    }

    /// Drop deleted hosts from the master inventory. Failures are only warned about.
    async fn remove_hosts(&self, hosts: Vec<String>) {
        let inventory = Arc::clone(&self.inventory);
        match tokio::task::spawn_blocking(move || inventory.remove_hosts(&hosts)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Could not update the master inventory after cleanup: {}", e),
            Err(e) => log::warn!("Master inventory cleanup panicked: {}", e),
        }
    }
}

/// Run one task on the blocking pool; a panic becomes a failed task
async fn dispatch(worker: Arc<Worker>, task: TaskDescriptor) -> TaskOutcome {
    let name = task.name();
    let ledger = worker.ledger.clone();
    let fallback = TaskOutcome::skipped(&task);
    match tokio::task::spawn_blocking(move || worker.execute(task)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let error = PluginError::new(PluginErrorKind::Panic, format!("task {} panicked: {}", name, e));
            log::error!("[{}] {}", name, error.summary());
            ledger.record_fail(fallback.record.clone());
            TaskOutcome {
                status: TaskStatus::Failed(error),
                ..fallback
            }
        }
    }
}

/// State a worker thread needs, shared read-only
struct Worker {
    registry: Arc<PluginRegistry>,
    config: Arc<Config>,
    inventory: Arc<Inventory>,
    data_folder: PathBuf,
    ledger: SharedLedger,
}

impl Worker {
    fn execute(&self, mut task: TaskDescriptor) -> TaskOutcome {
        let name = task.name();
        log::info!("[{}] started", name);

        let mut changes = Vec::new();
        let mut failure = None;
        for index in 0..task.methods.len() {
            let method = task.methods[index].method;
            log::debug!("[{}] invoking {}", name, method);
            match self.invoke(&task, method) {
                Ok(returned) => {
                    changes.extend(write_back(&task.payload, method, &returned));
                    task.methods[index].returned = Some(returned);
                }
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        let record = task.record();
        let status = match failure {
            None => {
                log::info!("[{}] passed", name);
                self.ledger.record_pass(record.clone());
                TaskStatus::Passed
            }
            Some(error) => {
                log::error!("[{}] failed: {}", name, error.summary());
                log::debug!("[{}] traceback:\n{}", name, error.traceback);
                self.ledger.record_fail(record.clone());
                TaskStatus::Failed(error)
            }
        };

        TaskOutcome {
            kind: task.kind,
            key: task.resource,
            record,
            status,
            methods: task.methods,
            changes,
        }
    }

    fn invoke(&self, task: &TaskDescriptor, method: Method) -> PluginResult<MethodReturn> {
        let kind = error_kind(&task.payload, method);
        let context = self.context(&task.payload);
        let lookup = |e: PluginSystemError| PluginError::from_error(kind, &e);

        match &task.payload {
            TaskPayload::Scenario { name, resource_check } => match method {
                Method::CheckResources => {
                    self.check_resources(name, resource_check.as_ref(), &context)?;
                    Ok(MethodReturn::Unit)
                }
                other => Err(unsupported(task, other)),
            },
            TaskPayload::Asset(asset) => {
                let plugin = self.registry.provisioner(asset.provisioner()).map_err(lookup)?;
                match method {
                    Method::Validate => {
                        self.check_credential(asset.credential())?;
                        plugin.validate(asset, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    Method::Authenticate => {
                        plugin.authenticate(asset, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    Method::Create => Ok(MethodReturn::Created(plugin.create(asset, &context)?)),
                    Method::Delete => {
                        plugin.delete(asset, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    other => Err(unsupported(task, other)),
                }
            }
            TaskPayload::Action { action, hosts } => {
                let plugin = self.registry.orchestrator(action.orchestrator()).map_err(lookup)?;
                match method {
                    Method::Validate => {
                        plugin.validate(action, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    Method::Run => {
                        self.with_unique_inventory(&task.name(), hosts, context, kind, |context| {
                            plugin.run(action, hosts, context)
                        })?;
                        Ok(MethodReturn::Unit)
                    }
                    other => Err(unsupported(task, other)),
                }
            }
            TaskPayload::Execute { execute, hosts } => {
                let plugin = self.registry.executor(execute.executor()).map_err(lookup)?;
                match method {
                    Method::Validate => {
                        plugin.validate(execute, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    Method::Run => {
                        let output = self.with_unique_inventory(&task.name(), hosts, context, kind, |context| {
                            plugin.run(execute, hosts, context)
                        })?;
                        Ok(MethodReturn::Executed(output))
                    }
                    other => Err(unsupported(task, other)),
                }
            }
            TaskPayload::Report { report, executes, .. } => {
                let plugin = self.registry.importer(report.importer()).map_err(lookup)?;
                match method {
                    Method::Validate => {
                        self.check_credential(report.provider().and_then(|p| p.credential.as_deref()))?;
                        plugin.validate(report, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    Method::ImportArtifacts => {
                        Ok(MethodReturn::Imported(plugin.import_artifacts(report, executes, &context)?))
                    }
                    other => Err(unsupported(task, other)),
                }
            }
            TaskPayload::Notification { notification, summary } => {
                let plugin = self.registry.notifier(notification.notifier()).map_err(lookup)?;
                match method {
                    Method::Validate => {
                        plugin.validate(notification, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    Method::Notify => {
                        plugin.notify(notification, summary, &context)?;
                        Ok(MethodReturn::Unit)
                    }
                    other => Err(unsupported(task, other)),
                }
            }
        }
    }

    fn context(&self, payload: &TaskPayload) -> PluginContext {
        let credential = match payload {
            TaskPayload::Asset(asset) => asset.credential(),
            TaskPayload::Report { report, .. } => report.provider().and_then(|p| p.credential.as_deref()),
            _ => None,
        }
        .and_then(|name| self.config.credential(name).cloned());

        PluginContext {
            config: Arc::clone(&self.config),
            workspace: self.config.workspace().to_path_buf(),
            data_folder: self.data_folder.clone(),
            results_folder: self.config.results_folder(),
            artifacts_folder: self.config.artifacts_folder(),
            master_inventory: self.inventory.master_path(),
            unique_inventory: None,
            credential,
        }
    }

    fn check_credential(&self, name: Option<&str>) -> PluginResult<()> {
        match name {
            Some(name) if self.config.credential(name).is_none() => Err(PluginError::new(
                PluginErrorKind::Validation,
                format!("credential '{}' is not defined in the settings", name),
            )),
            _ => Ok(()),
        }
    }

    fn check_resources(&self, scenario: &str, resource_check: Option<&Value>, context: &PluginContext) -> PluginResult<()> {
        let Some(resource_check) = resource_check else {
            return Ok(());
        };
        let checkers = self.registry.resource_checkers();
        if checkers.is_empty() {
            log::warn!("Scenario '{}' declares resource_check but no resource checker is registered", scenario);
            return Ok(());
        }
        for checker in checkers {
            log::debug!("Checking external resources of '{}' with '{}'", scenario, checker.name());
            checker.check(scenario, resource_check, context)?;
        }
        Ok(())
    }

    /// Run `call` with a unique inventory of `hosts` in the context, deleting it afterwards
    fn with_unique_inventory<T>(
        &self,
        task: &str,
        hosts: &HostSet,
        mut context: PluginContext,
        kind: PluginErrorKind,
        call: impl FnOnce(&PluginContext) -> PluginResult<T>,
    ) -> PluginResult<T> {
        let unavailable: Vec<&str> = hosts
            .hosts
            .iter()
            .filter(|asset| !asset.is_concrete())
            .map(|asset| asset.name())
            .collect();
        if !unavailable.is_empty() {
            return Err(PluginError::new(
                PluginErrorKind::HostUnavailable,
                format!("hosts have no address yet: {}", unavailable.join(", ")),
            ));
        }

        let targets: Vec<&Asset> = hosts.hosts.iter().collect();
        let path = self
            .inventory
            .create_unique(task, &targets)
            .map_err(|e| PluginError::from_error(kind, &e))?;
        context.unique_inventory = Some(path.clone());

        let result = call(&context);
        if let Err(e) = self.inventory.delete_unique(&path) {
            log::warn!("[{}] could not delete unique inventory {}: {}", task, path.display(), e);
        }
        result
    }
}

/// The change a successful call asks the runner to apply
fn write_back(payload: &TaskPayload, method: Method, returned: &MethodReturn) -> Option<WriteBack> {
    match (method, returned) {
        (Method::Create, MethodReturn::Created(created)) => {
            let concrete = created.clone().into_vec();
            (!concrete.is_empty()).then_some(WriteBack::Provisioned(concrete))
        }
        (Method::Delete, _) if matches!(payload, TaskPayload::Asset(_)) => Some(WriteBack::Deleted),
        (Method::Run, MethodReturn::Executed(output)) => Some(WriteBack::Artifacts(output.clone())),
        (Method::ImportArtifacts, MethodReturn::Imported(results)) => Some(WriteBack::Imported(results.clone())),
        (Method::Notify, _) => match payload {
            TaskPayload::Notification { summary, .. } => summary.trigger.map(WriteBack::Dispatched),
            _ => None,
        },
        _ => None,
    }
}

/// The error kind a failure of `method` on this payload is reported as
fn error_kind(payload: &TaskPayload, method: Method) -> PluginErrorKind {
    match method {
        Method::Validate => PluginErrorKind::Validation,
        Method::Authenticate => PluginErrorKind::Authentication,
        Method::Create => PluginErrorKind::Provision,
        Method::Delete => PluginErrorKind::Teardown,
        Method::Run if matches!(payload, TaskPayload::Execute { .. }) => PluginErrorKind::Execution,
        Method::Run => PluginErrorKind::Orchestration,
        Method::ImportArtifacts => PluginErrorKind::Import,
        Method::Notify => PluginErrorKind::Notification,
        Method::CheckResources => PluginErrorKind::ResourceCheck,
    }
}

fn unsupported(task: &TaskDescriptor, method: Method) -> PluginError {
    PluginError::new(
        PluginErrorKind::Other,
        format!("{} tasks of {} '{}' do not support '{}'", task.kind, task.resource.kind, task.resource.name, method),
    )
}

#[cfg(test)]
mod tests;
