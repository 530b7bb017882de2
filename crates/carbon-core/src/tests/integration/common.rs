#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};
use tempfile::{tempdir, TempDir};

use crate::driver::{CancelFlag, ScenarioDriver};
use crate::kernel::Carbon;
use crate::plugin_system::error::{PluginError, PluginErrorKind};
use crate::plugin_system::traits::{
    ConcreteAsset, CreateResult, ExecuteOutput, Executor, ImportResult, Importer, Notifier, Orchestrator, Plugin,
    PluginContext, PluginResult, Provisioner, ResourceChecker,
};
use crate::plugin_system::PluginRegistry;
use crate::resources::{Action, Asset, Execute, Notification, Report, Resource, Scenario};
use crate::storage::{Config, Credential, LocalStorageProvider};
use crate::task::{HostSet, RunSummary};

// ===== CALL RECORDER =====

/// Shared by every fake plugin of a test: the calls made, in order, the calls
/// told to fail, and the peak number of calls in flight at once
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashSet<String>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay: Arc<Mutex<Duration>>,
    cancel_on: Arc<Mutex<Option<(String, CancelFlag)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the call `<method>:<resource>` raise
    pub fn fail_on(&self, call: &str) {
        self.failures.lock().unwrap().insert(call.to_string());
    }

    /// Keep every call busy for `delay`, so overlapping calls show up in `peak`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Raise `flag` when the call `<method>:<resource>` is made
    pub fn cancel_on(&self, call: &str, flag: CancelFlag) {
        *self.cancel_on.lock().unwrap() = Some((call.to_string(), flag));
    }

    /// Record an observation that can never fail
    pub fn note(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of one method, resource names only
    pub fn calls_of(&self, method: &str) -> Vec<String> {
        let prefix = format!("{}:", method);
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, method: &str, resource: &str, kind: PluginErrorKind) -> PluginResult<()> {
        let call = format!("{}:{}", method, resource);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some((trigger, flag)) = self.cancel_on.lock().unwrap().as_ref() {
            if *trigger == call {
                flag.raise();
            }
        }

        if self.failures.lock().unwrap().contains(&call) {
            return Err(PluginError::new(kind, format!("{} refused by the test", call)));
        }
        Ok(())
    }
}

// ===== FAKE PLUGINS =====

/// Hands out `10.0.<n>.<i>` addresses, `count` of them per asset
pub struct FakeProvisioner {
    recorder: Recorder,
    next: AtomicUsize,
    /// Addresses to hand out instead, by asset name
    fixed: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeProvisioner {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            next: AtomicUsize::new(1),
            fixed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_addresses(self, asset: &str, addresses: &[&str]) -> Self {
        self.fixed
            .lock()
            .unwrap()
            .insert(asset.to_string(), addresses.iter().map(|a| a.to_string()).collect());
        self
    }
}

impl Plugin for FakeProvisioner {
    fn name(&self) -> &str {
        "fake"
    }
}

impl Provisioner for FakeProvisioner {
    fn validate(&self, asset: &Asset, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("validate", asset.name(), PluginErrorKind::Validation)
    }

    fn authenticate(&self, asset: &Asset, context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("authenticate", asset.name(), PluginErrorKind::Authentication)?;
        if context.credential.is_none() {
            return Err(PluginError::new(PluginErrorKind::Authentication, "no credential in context"));
        }
        Ok(())
    }

    fn create(&self, asset: &Asset, _context: &PluginContext) -> PluginResult<CreateResult> {
        self.recorder.record("create", asset.name(), PluginErrorKind::Provision)?;
        let addresses = match self.fixed.lock().unwrap().get(asset.name()) {
            Some(addresses) => addresses.clone(),
            None => {
                let network = self.next.fetch_add(1, Ordering::SeqCst);
                (0..asset.count()).map(|i| format!("10.0.{}.{}", network, i + 1)).collect()
            }
        };
        let mut concrete: Vec<ConcreteAsset> = addresses.into_iter().map(ConcreteAsset::new).collect();
        Ok(match concrete.len() {
            0 => CreateResult::Nothing,
            1 => CreateResult::One(concrete.remove(0)),
            _ => CreateResult::Many(concrete),
        })
    }

    fn delete(&self, asset: &Asset, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("delete", asset.name(), PluginErrorKind::Teardown)
    }
}

/// Notes `inventory:<action>` when the unique inventory it was handed lists every target host
pub struct FakeOrchestrator {
    recorder: Recorder,
}

impl Plugin for FakeOrchestrator {
    fn name(&self) -> &str {
        "ansible"
    }
}

impl Orchestrator for FakeOrchestrator {
    fn validate(&self, action: &Action, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("validate", action.name(), PluginErrorKind::Validation)
    }

    fn run(&self, action: &Action, hosts: &HostSet, context: &PluginContext) -> PluginResult<()> {
        if let Some(content) = context
            .unique_inventory
            .as_deref()
            .and_then(|path| std::fs::read_to_string(path).ok())
        {
            if hosts.names().iter().all(|host| content.contains(&format!("[{}]", host))) {
                self.recorder.note(format!("inventory:{}", action.name()));
            }
        }
        self.recorder.record("run", action.name(), PluginErrorKind::Orchestration)?;
        // Per-host failures, e.g. `host:install@a_1`
        for host in hosts.names() {
            self.recorder
                .record("host", &format!("{}@{}", action.name(), host), PluginErrorKind::Orchestration)?;
        }
        Ok(())
    }
}

pub struct FakeExecutor {
    recorder: Recorder,
}

impl Plugin for FakeExecutor {
    fn name(&self) -> &str {
        "runner"
    }
}

impl Executor for FakeExecutor {
    fn validate(&self, execute: &Execute, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("validate", execute.name(), PluginErrorKind::Validation)
    }

    fn run(&self, execute: &Execute, hosts: &HostSet, _context: &PluginContext) -> PluginResult<ExecuteOutput> {
        self.recorder.record("run", execute.name(), PluginErrorKind::Execution)?;
        let mut output = ExecuteOutput::default();
        for host in hosts.names() {
            output
                .artifact_locations
                .insert(host.to_string(), vec![format!("{}-results.xml", execute.name())]);
        }
        output.artifacts.push(format!("{}-results.xml", execute.name()));
        Ok(output)
    }
}

pub struct FakeImporter {
    recorder: Recorder,
}

impl Plugin for FakeImporter {
    fn name(&self) -> &str {
        "polarion"
    }
}

impl Importer for FakeImporter {
    fn validate(&self, report: &Report, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("validate", report.name(), PluginErrorKind::Validation)
    }

    fn import_artifacts(&self, report: &Report, executes: &[Execute], _context: &PluginContext) -> PluginResult<Vec<ImportResult>> {
        self.recorder.record("import", report.name(), PluginErrorKind::Import)?;
        Ok(executes
            .iter()
            .flat_map(|execute| execute.artifacts().iter())
            .map(|artifact| ImportResult {
                artifact: artifact.clone(),
                passed: true,
                details: Map::new(),
            })
            .collect())
    }
}

/// Records `notify:<name>@<trigger>`
pub struct FakeNotifier {
    recorder: Recorder,
    concurrent: Option<bool>,
}

impl Plugin for FakeNotifier {
    fn name(&self) -> &str {
        "email-notifier"
    }

    fn concurrent(&self) -> Option<bool> {
        self.concurrent
    }
}

impl Notifier for FakeNotifier {
    fn validate(&self, notification: &Notification, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("validate", notification.name(), PluginErrorKind::Validation)
    }

    fn notify(&self, notification: &Notification, summary: &RunSummary, _context: &PluginContext) -> PluginResult<()> {
        let trigger = summary.trigger.map(|t| t.to_string()).unwrap_or_default();
        self.recorder.record(
            "notify",
            &format!("{}@{}", notification.name(), trigger),
            PluginErrorKind::Notification,
        )
    }
}

pub struct FakeChecker {
    recorder: Recorder,
}

impl Plugin for FakeChecker {
    fn name(&self) -> &str {
        "fake-checker"
    }
}

impl ResourceChecker for FakeChecker {
    fn check(&self, scenario: &str, _resource_check: &Value, _context: &PluginContext) -> PluginResult<()> {
        self.recorder.record("check", scenario, PluginErrorKind::ResourceCheck)
    }
}

/// Builtins plus one fake of every class, all reporting to `recorder`
pub fn fake_registry(recorder: &Recorder) -> PluginRegistry {
    registry_with(recorder, FakeProvisioner::new(recorder.clone()))
}

pub fn registry_with(recorder: &Recorder, provisioner: FakeProvisioner) -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtins().unwrap();
    registry.register_provisioner(Arc::new(provisioner)).unwrap();
    registry
        .register_orchestrator(Arc::new(FakeOrchestrator { recorder: recorder.clone() }))
        .unwrap();
    registry
        .register_executor(Arc::new(FakeExecutor { recorder: recorder.clone() }))
        .unwrap();
    registry
        .register_importer(Arc::new(FakeImporter { recorder: recorder.clone() }))
        .unwrap();
    registry
        .register_notifier(Arc::new(FakeNotifier {
            recorder: recorder.clone(),
            concurrent: None,
        }))
        .unwrap();
    registry
        .register_resource_checker(Arc::new(FakeChecker { recorder: recorder.clone() }))
        .unwrap();
    registry
}

// ===== TEST ENVIRONMENT =====

/// Settings pointing every folder into a temp dir, with a `fake-cred` credential
pub fn test_config(dir: &Path) -> Config {
    let mut fields = Map::new();
    fields.insert("username".into(), Value::String("tester".into()));
    Config::default()
        .with_data_folder(dir.join("data"))
        .with_lock_timing(Duration::from_millis(500), Duration::from_millis(10))
        .with_credential(Credential {
            name: "fake-cred".into(),
            fields,
        })
}

/// A temp dir, a [`Carbon`] handle over it, and the recorder of its fakes
pub struct TestEnv {
    pub dir: TempDir,
    pub recorder: Recorder,
    pub carbon: Carbon,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with(|config| config, fake_registry)
    }

    pub fn with_config(configure: impl FnOnce(Config) -> Config) -> Self {
        Self::with(configure, fake_registry)
    }

    pub fn with(configure: impl FnOnce(Config) -> Config, registry: impl FnOnce(&Recorder) -> PluginRegistry) -> Self {
        let dir = tempdir().unwrap();
        let recorder = Recorder::new();
        let config = configure(test_config(dir.path()));
        let storage = Arc::new(LocalStorageProvider::new(dir.path().to_path_buf()));
        let carbon = Carbon::with_storage(config, registry(&recorder), storage);
        Self { dir, recorder, carbon }
    }

    pub fn scenario(&self, yaml: &str) -> Scenario {
        self.carbon.loader().load_str(yaml).unwrap()
    }

    pub fn driver(&self) -> ScenarioDriver {
        self.carbon.driver()
    }
}
