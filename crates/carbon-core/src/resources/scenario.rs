use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;

use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::{
    Action, Asset, Execute, Notification, Report, Resource, ResourceBase, ResourceContext, ResourceKey, ResourceType,
};
use crate::task::{DeclaredTask, Method, TaskKind, TaskRecord};

/// Passed and failed tasks of a run, in completion order
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    passed: Vec<TaskRecord>,
    failed: Vec<TaskRecord>,
}

impl Ledger {
    pub fn record_pass(&mut self, record: TaskRecord) {
        self.passed.push(record);
    }

    pub fn record_fail(&mut self, record: TaskRecord) {
        self.failed.push(record);
    }

    pub fn passed(&self) -> &[TaskRecord] {
        &self.passed
    }

    pub fn failed(&self) -> &[TaskRecord] {
        &self.failed
    }

    pub fn failed_in(&self, kind: TaskKind) -> usize {
        self.failed.iter().filter(|record| record.kind == kind).count()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// The scenario-level mutex guarding the ledger. Workers append through it.
#[derive(Clone, Debug, Default)]
pub struct SharedLedger {
    ledger: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the ledger. A worker that panicked mid-append cannot leave a
    /// half-written record, so a poisoned lock is still usable.
    pub fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_pass(&self, record: TaskRecord) {
        self.lock().record_pass(record);
    }

    pub fn record_fail(&self, record: TaskRecord) {
        self.lock().record_fail(record);
    }

    pub fn snapshot(&self) -> Ledger {
        self.lock().clone()
    }
}

/// Root container of a run: the resources it owns and its included children
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    #[serde(flatten)]
    base: ResourceBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_check: Option<Value>,
    assets: Vec<Asset>,
    actions: Vec<Action>,
    executes: Vec<Execute>,
    reports: Vec<Report>,
    notifications: Vec<Notification>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    child_scenarios: Vec<Scenario>,
    #[serde(skip)]
    ledger: SharedLedger,
}

impl Scenario {
    pub fn new(name: impl Into<String>, context: &ResourceContext) -> Self {
        Self {
            base: ResourceBase::new(name, context),
            path: None,
            resource_check: None,
            assets: Vec::new(),
            actions: Vec::new(),
            executes: Vec::new(),
            reports: Vec::new(),
            notifications: Vec::new(),
            child_scenarios: Vec::new(),
            ledger: SharedLedger::new(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.base = self.base.with_description(description);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_resource_check(mut self, resource_check: Option<Value>) -> Self {
        self.resource_check = resource_check.filter(|value| !value.is_null());
        self
    }

    pub fn add_asset(&mut self, asset: Asset) -> ResourceResult<()> {
        ensure_unique(&self.assets, &asset, self.base.name())?;
        self.assets.push(asset);
        Ok(())
    }

    pub fn add_action(&mut self, action: Action) -> ResourceResult<()> {
        ensure_unique(&self.actions, &action, self.base.name())?;
        self.actions.push(action);
        Ok(())
    }

    pub fn add_execute(&mut self, execute: Execute) -> ResourceResult<()> {
        ensure_unique(&self.executes, &execute, self.base.name())?;
        self.executes.push(execute);
        Ok(())
    }

    pub fn add_report(&mut self, report: Report) -> ResourceResult<()> {
        ensure_unique(&self.reports, &report, self.base.name())?;
        self.reports.push(report);
        Ok(())
    }

    pub fn add_notification(&mut self, notification: Notification) -> ResourceResult<()> {
        ensure_unique(&self.notifications, &notification, self.base.name())?;
        self.notifications.push(notification);
        Ok(())
    }

    /// Attach an included scenario. The whole subtree shares this scenario's ledger.
    pub fn add_child(&mut self, mut child: Scenario) {
        child.share_ledger(&self.ledger);
        self.child_scenarios.push(child);
    }

    fn share_ledger(&mut self, ledger: &SharedLedger) {
        self.ledger = ledger.clone();
        for child in &mut self.child_scenarios {
            child.share_ledger(ledger);
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.base.description()
    }

    pub fn resource_check(&self) -> Option<&Value> {
        self.resource_check.as_ref()
    }

    pub fn context(&self) -> &ResourceContext {
        self.base.context()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn executes(&self) -> &[Execute] {
        &self.executes
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn child_scenarios(&self) -> &[Scenario] {
        &self.child_scenarios
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn passed_tasks(&self) -> Vec<TaskRecord> {
        self.ledger.lock().passed().to_vec()
    }

    pub fn failed_tasks(&self) -> Vec<TaskRecord> {
        self.ledger.lock().failed().to_vec()
    }

    /// Every scenario of the tree with its scope, parents before children
    pub fn walk(&self) -> Vec<(Vec<usize>, &Scenario)> {
        let mut found = vec![(Vec::new(), self)];
        for (index, child) in self.child_scenarios.iter().enumerate() {
            for (mut scope, scenario) in child.walk() {
                scope.insert(0, index);
                found.push((scope, scenario));
            }
        }
        found
    }

    pub fn get_all_assets(&self) -> Vec<(Vec<usize>, &Asset)> {
        self.walk()
            .into_iter()
            .flat_map(|(scope, scenario)| scenario.assets.iter().map(move |asset| (scope.clone(), asset)))
            .collect()
    }

    pub fn get_all_actions(&self) -> Vec<(Vec<usize>, &Action)> {
        self.walk()
            .into_iter()
            .flat_map(|(scope, scenario)| scenario.actions.iter().map(move |action| (scope.clone(), action)))
            .collect()
    }

    pub fn get_all_executes(&self) -> Vec<(Vec<usize>, &Execute)> {
        self.walk()
            .into_iter()
            .flat_map(|(scope, scenario)| scenario.executes.iter().map(move |execute| (scope.clone(), execute)))
            .collect()
    }

    pub fn get_all_reports(&self) -> Vec<(Vec<usize>, &Report)> {
        self.walk()
            .into_iter()
            .flat_map(|(scope, scenario)| scenario.reports.iter().map(move |report| (scope.clone(), report)))
            .collect()
    }

    pub fn get_all_notifications(&self) -> Vec<(Vec<usize>, &Notification)> {
        self.walk()
            .into_iter()
            .flat_map(|(scope, scenario)| {
                scenario
                    .notifications
                    .iter()
                    .map(move |notification| (scope.clone(), notification))
            })
            .collect()
    }

    pub fn scope(&self, scope: &[usize]) -> Option<&Scenario> {
        let mut current = self;
        for index in scope {
            current = current.child_scenarios.get(*index)?;
        }
        Some(current)
    }

    pub fn scope_mut(&mut self, scope: &[usize]) -> Option<&mut Scenario> {
        let mut current = self;
        for index in scope {
            current = current.child_scenarios.get_mut(*index)?;
        }
        Some(current)
    }

    fn scope_for(&mut self, key: &ResourceKey) -> ResourceResult<&mut Scenario> {
        self.scope_mut(&key.scope).ok_or_else(|| ResourceError::NotFound {
            kind: ResourceType::Scenario,
            name: format!("{:?}", key.scope),
        })
    }

    pub fn asset_mut(&mut self, key: &ResourceKey) -> ResourceResult<&mut Asset> {
        let scope = self.scope_for(key)?;
        find_mut(&mut scope.assets, key)
    }

    pub fn action_mut(&mut self, key: &ResourceKey) -> ResourceResult<&mut Action> {
        let scope = self.scope_for(key)?;
        find_mut(&mut scope.actions, key)
    }

    pub fn execute_mut(&mut self, key: &ResourceKey) -> ResourceResult<&mut Execute> {
        let scope = self.scope_for(key)?;
        find_mut(&mut scope.executes, key)
    }

    pub fn report_mut(&mut self, key: &ResourceKey) -> ResourceResult<&mut Report> {
        let scope = self.scope_for(key)?;
        find_mut(&mut scope.reports, key)
    }

    pub fn notification_mut(&mut self, key: &ResourceKey) -> ResourceResult<&mut Notification> {
        let scope = self.scope_for(key)?;
        find_mut(&mut scope.notifications, key)
    }

    /// Replace a logical asset, in place, with the assets it expanded into.
    /// Fails without changing the scope if a replacement name is already taken.
    pub fn replace_asset(&mut self, key: &ResourceKey, replacements: Vec<Asset>) -> ResourceResult<()> {
        let scope = self.scope_for(key)?;
        let index = scope
            .assets
            .iter()
            .position(|asset| asset.name() == key.name)
            .ok_or_else(|| ResourceError::NotFound {
                kind: ResourceType::Asset,
                name: key.name.clone(),
            })?;
        for (n, replacement) in replacements.iter().enumerate() {
            let name = replacement.name();
            let clash = scope.assets.iter().enumerate().any(|(i, asset)| i != index && asset.name() == name)
                || replacements[..n].iter().any(|earlier| earlier.name() == name);
            if clash {
                return Err(ResourceError::DuplicateName {
                    kind: ResourceType::Asset,
                    name: name.to_string(),
                    scenario: scope.name().to_string(),
                });
            }
        }
        scope.assets.splice(index..=index, replacements);
        Ok(())
    }

    pub fn mark_passed(&mut self) {
        self.base.mark_passed();
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.base.mark_failed(trace);
    }
}

impl Resource for Scenario {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Scenario
    }

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn get_tasks(&self) -> Vec<DeclaredTask> {
        if self.resource_check.is_some() {
            vec![DeclaredTask::new(TaskKind::Validate, vec![Method::CheckResources])]
        } else {
            Vec::new()
        }
    }
}

fn ensure_unique<T: Resource>(existing: &[T], candidate: &T, scenario: &str) -> ResourceResult<()> {
    if existing.iter().any(|item| item.name() == candidate.name()) {
        return Err(ResourceError::DuplicateName {
            kind: candidate.resource_type(),
            name: candidate.name().to_string(),
            scenario: scenario.to_string(),
        });
    }
    Ok(())
}

fn find_mut<'a, T: Resource>(items: &'a mut [T], key: &ResourceKey) -> ResourceResult<&'a mut T> {
    items
        .iter_mut()
        .find(|item| item.name() == key.name)
        .ok_or_else(|| ResourceError::NotFound {
            kind: key.kind,
            name: key.name.clone(),
        })
}
