use std::path::PathBuf;
use std::sync::Arc;

use crate::plugin_system::error::{PluginError, PluginErrorKind};
use crate::plugin_system::traits::{ConcreteAsset, ExecuteOutput};
use crate::resources::error::ResourceError;
use crate::resources::notification::Trigger;
use crate::resources::{Resource, ResourceContext, ResourceKey, ResourceType, Scenario, ScenarioLoader};
use crate::runner::outcome::apply;
use crate::runner::{TaskOutcome, TaskStatus, WriteBack};
use crate::storage::{Config, LocalStorageProvider};
use crate::task::{TaskKind, TaskRecord};

fn scenario() -> Scenario {
    let context = ResourceContext::new(Arc::new(Config::default()), "/tmp/carbon-tests/data");
    ScenarioLoader::new(Arc::new(LocalStorageProvider::new(PathBuf::from("/"))), context)
        .load_str(
            r#"
name: outcomes
provision:
  - name: first
    provider: { name: fake }
  - name: pool
    provider: { name: fake, count: 3 }
  - name: last
    ip_address: 10.0.0.9
orchestrate:
  - name: deploy
    hosts: all
    cleanup:
      name: undeploy
execute:
  - name: smoke
    hosts: all
notifications:
  - name: mail
    on_success: true
"#,
        )
        .unwrap()
}

fn outcome(kind: TaskKind, resource: ResourceType, name: &str, status: TaskStatus, changes: Vec<WriteBack>) -> TaskOutcome {
    TaskOutcome {
        kind,
        key: ResourceKey::new(resource, &[], name),
        record: TaskRecord {
            kind,
            resource: name.to_string(),
        },
        status,
        methods: Vec::new(),
        changes,
    }
}

fn failure() -> TaskStatus {
    TaskStatus::Failed(PluginError::new(PluginErrorKind::Provision, "quota exceeded").with_traceback("trace: quota exceeded"))
}

#[test]
fn test_single_concrete_asset_keeps_its_name() {
    let mut scenario = scenario();
    let created = outcome(
        TaskKind::Provision,
        ResourceType::Asset,
        "first",
        TaskStatus::Passed,
        vec![WriteBack::Provisioned(vec![ConcreteAsset::new("10.0.0.1")])],
    );

    apply(&mut scenario, &created).unwrap();

    let asset = &scenario.assets()[0];
    assert_eq!(asset.name(), "first");
    assert_eq!(asset.ip_address(), Some("10.0.0.1"));
    assert_eq!(asset.expanded_from(), None);
}

#[test]
fn test_many_concrete_assets_expand_in_place() {
    let mut scenario = scenario();
    let created = outcome(
        TaskKind::Provision,
        ResourceType::Asset,
        "pool",
        TaskStatus::Passed,
        vec![WriteBack::Provisioned(vec![
            ConcreteAsset::new("10.0.1.1"),
            ConcreteAsset::new("10.0.1.2"),
            ConcreteAsset::new("10.0.1.3"),
        ])],
    );

    apply(&mut scenario, &created).unwrap();

    let names: Vec<&str> = scenario.assets().iter().map(|asset| asset.name()).collect();
    assert_eq!(names, vec!["first", "pool_0", "pool_1", "pool_2", "last"]);
    assert_eq!(scenario.assets()[3].ip_address(), Some("10.0.1.2"));
    assert!(scenario.assets()[1..4].iter().all(|asset| asset.count() == 1));
}

#[test]
fn test_failure_marks_the_resource() {
    let mut scenario = scenario();

    apply(&mut scenario, &outcome(TaskKind::Provision, ResourceType::Asset, "first", failure(), Vec::new())).unwrap();

    let asset = &scenario.assets()[0];
    assert_eq!(asset.status(), 1);
    assert_eq!(asset.base().last_error(), Some("trace: quota exceeded"));
    assert!(!asset.is_concrete());

    apply(&mut scenario, &outcome(TaskKind::Provision, ResourceType::Asset, "first", TaskStatus::Passed, Vec::new()))
        .unwrap();
    assert_eq!(scenario.assets()[0].status(), 0);
    assert_eq!(scenario.assets()[0].base().last_error(), None);
}

#[test]
fn test_skipped_tasks_change_nothing() {
    let mut scenario = scenario();
    scenario
        .asset_mut(&ResourceKey::new(ResourceType::Asset, &[], "last"))
        .unwrap()
        .mark_failed("earlier run");

    apply(&mut scenario, &outcome(TaskKind::Cleanup, ResourceType::Asset, "last", TaskStatus::Skipped, Vec::new()))
        .unwrap();

    assert_eq!(scenario.assets()[2].status(), 1);
}

#[test]
fn test_cleanup_status_lands_on_the_cleanup_action() {
    let mut scenario = scenario();

    apply(&mut scenario, &outcome(TaskKind::Cleanup, ResourceType::Action, "deploy", failure(), Vec::new())).unwrap();

    let action = &scenario.actions()[0];
    assert_eq!(action.status(), 0, "The orchestrate status is kept");
    assert_eq!(action.cleanup().unwrap().status(), 1);
}

#[test]
fn test_artifacts_and_dispatch_are_written_back() {
    let mut scenario = scenario();
    let mut output = ExecuteOutput::default();
    output.artifacts.push("junit.xml".into());

    apply(
        &mut scenario,
        &outcome(TaskKind::Execute, ResourceType::Execute, "smoke", TaskStatus::Passed, vec![WriteBack::Artifacts(output)]),
    )
    .unwrap();
    apply(
        &mut scenario,
        &outcome(
            TaskKind::Notification,
            ResourceType::Notification,
            "mail",
            TaskStatus::Passed,
            vec![WriteBack::Dispatched(Trigger::OnSuccess)],
        ),
    )
    .unwrap();

    assert_eq!(scenario.executes()[0].artifacts(), ["junit.xml"]);
    assert_eq!(scenario.notifications()[0].last_dispatched(), Some(Trigger::OnSuccess));
}

#[test]
fn test_expansion_onto_a_declared_name_is_rejected() {
    let mut scenario = ScenarioLoader::new(
        Arc::new(LocalStorageProvider::new(PathBuf::from("/"))),
        ResourceContext::new(Arc::new(Config::default()), "/tmp/carbon-tests/data"),
    )
    .load_str(
        r#"
name: clash
provision:
  - name: pool
    provider: { name: fake, count: 2 }
  - name: pool_1
    ip_address: 10.0.0.9
"#,
    )
    .unwrap();
    let created = outcome(
        TaskKind::Provision,
        ResourceType::Asset,
        "pool",
        TaskStatus::Passed,
        vec![WriteBack::Provisioned(vec![ConcreteAsset::new("10.0.1.1"), ConcreteAsset::new("10.0.1.2")])],
    );

    let err = apply(&mut scenario, &created).unwrap_err();

    assert!(matches!(err, ResourceError::DuplicateName { ref name, .. } if name == "pool_1"), "{:?}", err);
    let names: Vec<&str> = scenario.assets().iter().map(|asset| asset.name()).collect();
    assert_eq!(names, vec!["pool", "pool_1"]);
    assert_eq!(scenario.assets()[0].status(), 1);
    assert!(scenario.assets()[0].base().last_error().unwrap_or_default().contains("pool_1"));
}

#[test]
fn test_unknown_resource_is_an_error() {
    let mut scenario = scenario();

    let result = apply(&mut scenario, &outcome(TaskKind::Execute, ResourceType::Execute, "ghost", TaskStatus::Passed, Vec::new()));

    assert!(result.is_err());
}

#[test]
fn test_deleted_host_only_for_assets() {
    let deleted = outcome(TaskKind::Cleanup, ResourceType::Asset, "last", TaskStatus::Passed, vec![WriteBack::Deleted]);
    assert_eq!(deleted.deleted_host(), Some("last"));
    assert!(deleted.passed());

    let kept = outcome(TaskKind::Cleanup, ResourceType::Asset, "last", failure(), Vec::new());
    assert_eq!(kept.deleted_host(), None);
    assert_eq!(kept.error().unwrap().kind, PluginErrorKind::Provision);
}
