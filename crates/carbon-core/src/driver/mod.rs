//! # Carbon Core Scenario Driver
//!
//! Runs the phases a [`RunOptions`] selects, in order, and dispatches the
//! notification triggers around them.
//!
//! Failure policy:
//!
//! | where | effect | exit |
//! |---|---|---|
//! | validate task fails, or any build error before provision | abort, no cleanup | 2 |
//! | provision task fails | skip to cleanup | 1 |
//! | orchestrate / execute / report task fails | recorded, run continues | 1 |
//! | build error after provision started | skip to cleanup | 2 |
//! | master inventory write fails | skip to cleanup | 3 |
//! | cleanup task fails | recorded, `on_failure` fires | unchanged |
//!
//! A raised [`CancelFlag`] stops new tasks from starting; in-flight tasks
//! drain and cleanup still runs.
pub mod snapshot;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::inventory::Inventory;
use crate::kernel::error::{Error, Result};
use crate::pipeline::error::{BuilderError, BuilderResult};
use crate::pipeline::{NotificationPipelineBuilder, Pipeline, PipelineBuilder};
use crate::plugin_system::PluginRegistry;
use crate::resources::notification::Trigger;
use crate::resources::{Labels, Resource, Scenario};
use crate::runner::{PipelineReport, TaskRunner};
use crate::storage::{Config, StorageProvider};
use crate::task::{RunSummary, TaskKind, TaskRecord};

/// Which phases run and which resources take part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Requested phases. Validate always runs; cleanup runs whenever it or provision is requested.
    pub tasks: Vec<TaskKind>,
    pub labels: BTreeSet<String>,
    pub skip_labels: BTreeSet<String>,
    /// Names of notifications never dispatched
    pub skip_notify: BTreeSet<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tasks: TaskKind::PHASES.to_vec(),
            labels: BTreeSet::new(),
            skip_labels: BTreeSet::new(),
            skip_notify: BTreeSet::new(),
        }
    }
}

impl RunOptions {
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskKind>) -> Self {
        self.tasks = tasks.into_iter().collect();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skip_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skip_notify<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_notify = names.into_iter().map(Into::into).collect();
        self
    }

    /// Parse phase names as given on the command line
    pub fn parse_tasks<S: AsRef<str>>(names: &[S]) -> BuilderResult<Vec<TaskKind>> {
        names
            .iter()
            .map(|name| match name.as_ref().parse::<TaskKind>() {
                Ok(kind) if kind.is_phase() => Ok(kind),
                _ => Err(BuilderError::UnknownPhase(name.as_ref().to_string())),
            })
            .collect()
    }

    /// Reject option combinations no run accepts
    pub fn check(&self) -> BuilderResult<()> {
        if !self.labels.is_empty() && !self.skip_labels.is_empty() {
            return Err(BuilderError::ExclusiveLabels);
        }
        if let Some(kind) = self.tasks.iter().find(|kind| !kind.is_phase()) {
            return Err(BuilderError::NotAPhase(*kind));
        }
        Ok(())
    }

    /// Whether a resource with these labels passes the label filter
    pub fn keeps(&self, labels: &Labels) -> bool {
        if !self.labels.is_empty() {
            !labels.is_disjoint(&self.labels)
        } else if !self.skip_labels.is_empty() {
            labels.is_disjoint(&self.skip_labels)
        } else {
            true
        }
    }

    /// Phases this run executes, in run order
    pub fn selected_phases(&self) -> Vec<TaskKind> {
        TaskKind::PHASES
            .into_iter()
            .filter(|phase| match phase {
                TaskKind::Validate => true,
                TaskKind::Cleanup => {
                    self.tasks.contains(&TaskKind::Cleanup) || self.tasks.contains(&TaskKind::Provision)
                }
                other => self.tasks.contains(other),
            })
            .collect()
    }
}

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    /// At least one non-cleanup phase had failed tasks
    PhaseFailure,
    /// Validate failed, or the configuration or a pipeline build was rejected
    Aborted,
    /// The master inventory could not be written or locked
    InventoryFailure,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::PhaseFailure => 1,
            ExitStatus::Aborted => 2,
            ExitStatus::InventoryFailure => 3,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        match error.exit_code() {
            0 => ExitStatus::Success,
            1 => ExitStatus::PhaseFailure,
            3 => ExitStatus::InventoryFailure,
            _ => ExitStatus::Aborted,
        }
    }
}

/// Cooperative cancel flag shared by the driver, its runner, and signal handlers
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            log::warn!("Cancel requested: no new task will start, cleanup still runs");
        }
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub status: ExitStatus,
    pub phases: Vec<PipelineReport>,
    pub passed_tasks: Vec<TaskRecord>,
    pub failed_tasks: Vec<TaskRecord>,
    pub cancelled: bool,
    /// The error that aborted the run, if any
    pub error: Option<String>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.status.code()
    }

    /// The report of one phase, if it ran
    pub fn phase(&self, kind: TaskKind) -> Option<&PipelineReport> {
        self.phases.iter().find(|report| report.kind == kind)
    }
}

/// Composes the phase sequence of a scenario run
pub struct ScenarioDriver {
    registry: Arc<PluginRegistry>,
    config: Arc<Config>,
    storage: Arc<dyn StorageProvider>,
    data_folder: PathBuf,
    runner: TaskRunner,
    cancel: CancelFlag,
}

impl ScenarioDriver {
    pub fn new(
        registry: Arc<PluginRegistry>,
        config: Arc<Config>,
        storage: Arc<dyn StorageProvider>,
        uid: &str,
        data_folder: impl Into<PathBuf>,
    ) -> Self {
        let data_folder = data_folder.into();
        let cancel = CancelFlag::new();
        let inventory = Arc::new(Inventory::new(Arc::clone(&storage), &config, uid, &data_folder));
        let runner = TaskRunner::new(
            Arc::clone(&registry),
            Arc::clone(&config),
            inventory,
            data_folder.clone(),
            cancel.clone(),
        );
        Self {
            registry,
            config,
            storage,
            data_folder,
            runner,
            cancel,
        }
    }

    /// The flag that cancels this driver's runs
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Build the pipelines of every selected phase without running anything
    pub fn show(&self, scenario: &Scenario, options: &RunOptions) -> Result<Vec<Pipeline>> {
        options.check()?;
        let builder = PipelineBuilder::new(scenario, options);
        let mut pipelines = Vec::new();
        for kind in options.selected_phases() {
            pipelines.push(builder.build(kind)?);
        }
        Ok(pipelines)
    }

    /// Run only the validate phase
    pub async fn validate(&self, scenario: &mut Scenario, options: &RunOptions) -> RunReport {
        let options = options.clone().with_tasks([TaskKind::Validate]);
        self.run(scenario, &options).await
    }

    /// Run the selected phases and the notifications around them
    pub async fn run(&self, scenario: &mut Scenario, options: &RunOptions) -> RunReport {
        let mut phases: Vec<PipelineReport> = Vec::new();

        if let Err(e) = options.check() {
            log::error!("Run of '{}' rejected: {}", scenario.name(), e);
            let error = Error::from(e);
            return self.report(scenario, phases, ExitStatus::from_error(&error), Some(error));
        }

        let selected = options.selected_phases();
        log::info!(
            "Running scenario '{}': {}",
            scenario.name(),
            selected.iter().map(TaskKind::name).collect::<Vec<_>>().join(", ")
        );
        if let Err(e) = self.storage.create_dir_all(&self.data_folder) {
            log::warn!("Could not create run data folder {}: {}", self.data_folder.display(), e);
        }
        self.snapshot(scenario);
        self.notify(scenario, options, Trigger::OnStart).await;

        let mut fatal: Option<Error> = None;
        let mut phase_failed = false;
        let mut aborted = false;
        let mut provision_started = false;

        for kind in selected.iter().copied().filter(|kind| *kind != TaskKind::Cleanup) {
            if self.cancel.is_raised() {
                log::warn!("Run cancelled before {}, moving on to cleanup", kind);
                break;
            }
            if kind == TaskKind::Provision {
                provision_started = true;
            }

            let failed = match self.run_phase(scenario, kind, options).await {
                Ok(report) => {
                    let failed = !report.succeeded();
                    phases.push(report);
                    failed
                }
                Err(e) => {
                    log::error!("The {} phase of '{}' stopped: {}", kind, scenario.name(), e);
                    fatal = Some(e);
                    true
                }
            };
            self.phase_boundary(scenario, options, kind, failed).await;

            if !failed {
                continue;
            }
            if kind == TaskKind::Validate || (fatal.is_some() && !provision_started) {
                log::error!("Aborting '{}': {} failed", scenario.name(), kind);
                aborted = true;
                break;
            }
            if fatal.is_some() || kind == TaskKind::Provision {
                phase_failed |= fatal.is_none();
                log::warn!("The {} phase failed, skipping to cleanup", kind);
                break;
            }
            phase_failed = true;
        }

        let cleanup_selected = selected.contains(&TaskKind::Cleanup);
        let provision_selected = selected.contains(&TaskKind::Provision);
        if !aborted && cleanup_selected && (provision_started || !provision_selected) {
            let failed = match self.run_phase(scenario, TaskKind::Cleanup, options).await {
                Ok(report) => {
                    let failed = !report.succeeded();
                    phases.push(report);
                    failed
                }
                Err(e) => {
                    log::error!("The cleanup phase of '{}' could not be built: {}", scenario.name(), e);
                    fatal.get_or_insert(e);
                    true
                }
            };
            self.phase_boundary(scenario, options, TaskKind::Cleanup, failed).await;
        }

        let status = match &fatal {
            Some(error) => ExitStatus::from_error(error),
            None if aborted => ExitStatus::Aborted,
            None if phase_failed => ExitStatus::PhaseFailure,
            None => ExitStatus::Success,
        };
        let any_failed = scenario.ledger().lock().failed().iter().any(|record| record.kind.is_phase());
        let terminal = if status == ExitStatus::Success && !any_failed {
            Trigger::OnSuccess
        } else {
            Trigger::OnFailure
        };
        self.notify(scenario, options, terminal).await;
        self.notify(scenario, options, Trigger::OnDemand).await;

        let report = self.report(scenario, phases, status, fatal);
        self.snapshot(scenario);
        log::info!(
            "Scenario '{}' finished with exit code {}: {} passed, {} failed",
            report.scenario,
            report.exit_code(),
            report.passed_tasks.len(),
            report.failed_tasks.len()
        );
        report
    }

    async fn run_phase(&self, scenario: &mut Scenario, kind: TaskKind, options: &RunOptions) -> Result<PipelineReport> {
        let pipeline = PipelineBuilder::new(scenario, options).build(kind)?;
        self.runner.run(scenario, pipeline).await
    }

    async fn phase_boundary(&self, scenario: &mut Scenario, options: &RunOptions, kind: TaskKind, failed: bool) {
        self.notify(scenario, options, Trigger::OnTasks(kind)).await;
        if failed {
            self.notify(scenario, options, Trigger::OnTasksFailure(kind)).await;
        }
    }

    /// Dispatch the notifications of one trigger. Failures are recorded, never fatal.
    async fn notify(&self, scenario: &mut Scenario, options: &RunOptions, trigger: Trigger) {
        let ledger = scenario.ledger().snapshot();
        let summary = RunSummary {
            scenario: scenario.name().to_string(),
            trigger: Some(trigger),
            passed_tasks: ledger.passed().to_vec(),
            failed_tasks: ledger.failed().to_vec(),
        };
        let pipeline = NotificationPipelineBuilder::new(scenario, options, &self.registry).build(trigger, &summary);
        if pipeline.is_empty() {
            return;
        }
        if let Err(e) = self.runner.run(scenario, pipeline).await {
            log::warn!("Dispatching {} notifications failed: {}", trigger, e);
        }
    }

    fn snapshot(&self, scenario: &Scenario) {
        if let Err(e) = snapshot::write_snapshot(self.storage.as_ref(), &self.config, scenario) {
            log::warn!("Could not write the results snapshot: {}", e);
        }
    }

    fn report(&self, scenario: &Scenario, phases: Vec<PipelineReport>, status: ExitStatus, error: Option<Error>) -> RunReport {
        let ledger = scenario.ledger().snapshot();
        RunReport {
            scenario: scenario.name().to_string(),
            status,
            phases,
            passed_tasks: ledger.passed().to_vec(),
            failed_tasks: ledger.failed().to_vec(),
            cancelled: self.cancel.is_raised(),
            error: error.map(|e| e.to_string()),
        }
    }
}
