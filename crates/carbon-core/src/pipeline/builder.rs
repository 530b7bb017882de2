//! Phase pipeline compilation.
//!
//! For one phase the builder:
//!
//! 1. collects every resource of the scenario tree, a child's resource
//!    shadowing a same-named one declared higher up;
//! 2. applies the `labels` / `skip_labels` filter and, outside cleanup, drops
//!    actions whose last run failed;
//! 3. resolves action and execute `hosts` and report `executes`. The hosts of
//!    a cleanup sub-action are checked in every phase so a bad reference
//!    fails validate instead of the cleanup phase;
//! 4. emits one task per surviving resource that declares the phase, in
//!    declaration order (assets, actions, executes, reports, notifications),
//!    reversed for cleanup. Scenario-level tasks go first for validate and
//!    last otherwise.
use std::collections::BTreeSet;

use crate::driver::RunOptions;
use crate::kernel::constants::ALL_HOSTS;
use crate::pipeline::error::{BuilderError, BuilderResult};
use crate::pipeline::Pipeline;
use crate::resources::{Asset, Execute, Labels, Report, Resource, ResourceKey, ResourceType, Scenario};
use crate::task::{DeclaredTask, HostSet, TaskDescriptor, TaskKind, TaskPayload};

/// A resource together with the scope of the scenario declaring it
type Scoped<'s, T> = (Vec<usize>, &'s T);

/// Compiles phase pipelines from a scenario
pub struct PipelineBuilder<'a> {
    scenario: &'a Scenario,
    options: &'a RunOptions,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(scenario: &'a Scenario, options: &'a RunOptions) -> Self {
        Self { scenario, options }
    }

    /// Build the pipeline of one phase
    pub fn build(&self, kind: TaskKind) -> BuilderResult<Pipeline> {
        if !kind.is_phase() {
            return Err(BuilderError::NotAPhase(kind));
        }
        self.options.check()?;
        self.warn_unmatched_labels();

        let assets = shadowed(self.scenario, self.scenario.get_all_assets(), true);
        let actions = shadowed(self.scenario, self.scenario.get_all_actions(), true);
        let executes = shadowed(self.scenario, self.scenario.get_all_executes(), true);
        let reports = shadowed(self.scenario, self.scenario.get_all_reports(), true);
        let notifications = shadowed(self.scenario, self.scenario.get_all_notifications(), true);
        let all_hosts: Vec<Asset> = assets.iter().map(|(_, asset)| (*asset).clone()).collect();

        let mut tasks = Vec::new();

        for (scope, asset) in assets.iter().filter(|(_, asset)| self.options.keeps(asset.labels())) {
            if let Some(declared) = asset.task_for(kind) {
                tasks.push(self.task(
                    &declared,
                    ResourceKey::new(ResourceType::Asset, scope, asset.name()),
                    TaskPayload::Asset((*asset).clone()),
                    asset.base().concurrent(),
                ));
            }
        }

        for (scope, action) in actions.iter().filter(|(_, action)| self.options.keeps(action.labels())) {
            if kind == TaskKind::Cleanup {
                if let Some(cleanup) = action.cleanup() {
                    let Some(declared) = action.task_for(kind) else { continue };
                    // Cleanup must not stop here: asset teardown still has to run
                    let hosts =
                        match resolve_hosts(ResourceType::Action, cleanup.name(), cleanup.hosts(), &assets, &all_hosts) {
                            Ok(hosts) => hosts,
                            Err(e) => {
                                log::error!("Skipping cleanup action '{}': {}", cleanup.name(), e);
                                continue;
                            }
                        };
                    tasks.push(self.task(
                        &declared,
                        ResourceKey::new(ResourceType::Action, scope, action.name()),
                        TaskPayload::Action {
                            action: cleanup.clone(),
                            hosts,
                        },
                        cleanup.base().concurrent().or(action.base().concurrent()),
                    ));
                }
                continue;
            }
            if let Some(cleanup) = action.cleanup() {
                resolve_hosts(ResourceType::Action, cleanup.name(), cleanup.hosts(), &assets, &all_hosts)?;
            }
            if action.status() != 0 {
                log::info!("Skipping action '{}' for {}, its last run failed", action.name(), kind);
                continue;
            }
            if let Some(declared) = action.task_for(kind) {
                let hosts = resolve_hosts(ResourceType::Action, action.name(), action.hosts(), &assets, &all_hosts)?;
                tasks.push(self.task(
                    &declared,
                    ResourceKey::new(ResourceType::Action, scope, action.name()),
                    TaskPayload::Action {
                        action: (*action).clone(),
                        hosts,
                    },
                    action.base().concurrent(),
                ));
            }
        }

        for (scope, execute) in executes.iter().filter(|(_, execute)| self.options.keeps(execute.labels())) {
            if let Some(declared) = execute.task_for(kind) {
                let hosts = resolve_hosts(ResourceType::Execute, execute.name(), execute.hosts(), &assets, &all_hosts)?;
                tasks.push(self.task(
                    &declared,
                    ResourceKey::new(ResourceType::Execute, scope, execute.name()),
                    TaskPayload::Execute {
                        execute: (*execute).clone(),
                        hosts,
                    },
                    execute.base().concurrent(),
                ));
            }
        }

        for (scope, report) in reports.iter().filter(|(_, report)| self.options.keeps(report.labels())) {
            if let Some(declared) = report.task_for(kind) {
                let (resolved, hosts) = resolve_executes(report, &executes, &assets, &all_hosts)?;
                tasks.push(self.task(
                    &declared,
                    ResourceKey::new(ResourceType::Report, scope, report.name()),
                    TaskPayload::Report {
                        report: (*report).clone(),
                        executes: resolved,
                        hosts,
                    },
                    report.base().concurrent(),
                ));
            }
        }

        for (scope, notification) in notifications
            .iter()
            .filter(|(_, notification)| !self.options.skip_notify.contains(notification.name()))
            .filter(|(_, notification)| self.options.keeps(notification.labels()))
        {
            if let Some(declared) = notification.task_for(kind) {
                tasks.push(self.task(
                    &declared,
                    ResourceKey::new(ResourceType::Notification, scope, notification.name()),
                    TaskPayload::Notification {
                        notification: (*notification).clone(),
                        summary: Default::default(),
                    },
                    notification.base().concurrent(),
                ));
            }
        }

        if kind == TaskKind::Cleanup {
            tasks.reverse();
        }

        let scenario_tasks: Vec<TaskDescriptor> = self
            .scenario
            .walk()
            .into_iter()
            .filter_map(|(scope, scenario)| {
                let declared = scenario.task_for(kind)?;
                Some(self.task(
                    &declared,
                    ResourceKey::new(ResourceType::Scenario, &scope, scenario.name()),
                    TaskPayload::Scenario {
                        name: scenario.name().to_string(),
                        resource_check: scenario.resource_check().cloned(),
                    },
                    scenario.base().concurrent(),
                ))
            })
            .collect();
        let tasks: Vec<TaskDescriptor> = if kind == TaskKind::Validate {
            scenario_tasks.into_iter().chain(tasks).collect()
        } else {
            tasks.into_iter().chain(scenario_tasks).collect()
        };

        log::debug!("Built {} pipeline with {} task(s)", kind, tasks.len());
        Ok(Pipeline::new(kind.name(), kind, tasks))
    }

    fn task(&self, declared: &DeclaredTask, key: ResourceKey, payload: TaskPayload, resource_level: Option<bool>) -> TaskDescriptor {
        let settings_level = self.scenario.context().config().task_concurrency(declared.kind);
        let concurrent = declared.kind.resolve_concurrency(resource_level, settings_level);
        TaskDescriptor::new(declared.kind, key, payload, concurrent, &declared.methods)
    }

    fn warn_unmatched_labels(&self) {
        let requested: Vec<&String> = self.options.labels.iter().chain(self.options.skip_labels.iter()).collect();
        if requested.is_empty() {
            return;
        }
        let known = known_labels(self.scenario);
        for label in requested {
            if !known.contains(label) {
                log::warn!("Label '{}' matches no resource in scenario '{}'", label, self.scenario.name());
            }
        }
    }
}

/// Assets of the tree after shadowing, without logging. Used for the master inventory.
pub(crate) fn effective_assets(scenario: &Scenario) -> Vec<&Asset> {
    shadowed(scenario, scenario.get_all_assets(), false)
        .into_iter()
        .map(|(_, asset)| asset)
        .collect()
}

/// Keep one resource per name; a later scenario in walk order replaces the earlier one in place
fn shadowed<'s, T: Resource>(root: &Scenario, items: Vec<Scoped<'s, T>>, warn: bool) -> Vec<Scoped<'s, T>> {
    let mut kept: Vec<Scoped<'s, T>> = Vec::with_capacity(items.len());
    for (scope, item) in items {
        match kept.iter().position(|(_, existing)| existing.name() == item.name()) {
            Some(index) => {
                if warn {
                    log::warn!(
                        "{} '{}' of scenario '{}' shadows the one declared in scenario '{}'",
                        item.resource_type(),
                        item.name(),
                        scenario_name(root, &scope),
                        scenario_name(root, &kept[index].0),
                    );
                }
                kept[index] = (scope, item);
            }
            None => kept.push((scope, item)),
        }
    }
    kept
}

fn scenario_name<'s>(root: &'s Scenario, scope: &[usize]) -> &'s str {
    root.scope(scope).map(|scenario| scenario.name()).unwrap_or("<unknown>")
}

fn known_labels(scenario: &Scenario) -> Labels {
    let mut known = BTreeSet::new();
    let mut add = |labels: &Labels| known.extend(labels.iter().cloned());
    for (_, asset) in scenario.get_all_assets() {
        add(asset.labels());
    }
    for (_, action) in scenario.get_all_actions() {
        add(action.labels());
    }
    for (_, execute) in scenario.get_all_executes() {
        add(execute.labels());
    }
    for (_, report) in scenario.get_all_reports() {
        add(report.labels());
    }
    for (_, notification) in scenario.get_all_notifications() {
        add(notification.labels());
    }
    known
}

/// Resolve host references: `all`, an asset name, the base name of an expanded
/// asset, or a group / role name. Every reference must match at least one asset.
fn resolve_hosts(
    kind: ResourceType,
    resource: &str,
    references: &[String],
    assets: &[Scoped<'_, Asset>],
    all_hosts: &[Asset],
) -> BuilderResult<HostSet> {
    let mut hosts: Vec<Asset> = Vec::new();
    let mut unresolved = Vec::new();

    for reference in references {
        let matched: Vec<&Asset> = assets
            .iter()
            .map(|(_, asset)| *asset)
            .filter(|asset| {
                reference == ALL_HOSTS
                    || asset.name() == reference
                    || asset.expanded_from() == Some(reference.as_str())
                    || asset.group_names().contains(&reference.as_str())
            })
            .collect();
        if matched.is_empty() {
            unresolved.push(reference.clone());
            continue;
        }
        for asset in matched {
            if !hosts.iter().any(|host| host.name() == asset.name()) {
                hosts.push(asset.clone());
            }
        }
    }

    if !unresolved.is_empty() {
        return Err(BuilderError::UnresolvedHosts {
            kind,
            resource: resource.to_string(),
            hosts: unresolved,
        });
    }
    Ok(HostSet {
        hosts,
        all_hosts: all_hosts.to_vec(),
    })
}

/// Resolve a report's execute names, and the hosts those executes ran on
fn resolve_executes(
    report: &Report,
    executes: &[Scoped<'_, Execute>],
    assets: &[Scoped<'_, Asset>],
    all_hosts: &[Asset],
) -> BuilderResult<(Vec<Execute>, Vec<Asset>)> {
    let mut resolved: Vec<Execute> = Vec::new();
    let mut unresolved = Vec::new();
    for name in report.executes() {
        match executes.iter().find(|(_, execute)| execute.name() == name) {
            Some((_, execute)) => resolved.push((*execute).clone()),
            None => unresolved.push(name.clone()),
        }
    }
    if !unresolved.is_empty() {
        return Err(BuilderError::UnresolvedExecutes {
            report: report.name().to_string(),
            executes: unresolved,
        });
    }

    let mut hosts: Vec<Asset> = Vec::new();
    for execute in &resolved {
        let set = resolve_hosts(ResourceType::Execute, execute.name(), execute.hosts(), assets, all_hosts)?;
        for host in set.hosts {
            if !hosts.iter().any(|known| known.name() == host.name()) {
                hosts.push(host);
            }
        }
    }
    Ok((resolved, hosts))
}
