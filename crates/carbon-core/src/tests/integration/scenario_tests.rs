#![cfg(test)]

use std::fs;
use std::time::Duration;

use crate::driver::{ExitStatus, RunOptions};
use crate::pipeline::{NotificationPipelineBuilder, PipelineBuilder};
use crate::resources::notification::Trigger;
use crate::resources::Resource;
use crate::task::{RunSummary, TaskKind, TaskPayload, TaskRecord};

use super::common::TestEnv;

fn record(kind: TaskKind, resource: &str) -> TaskRecord {
    TaskRecord {
        kind,
        resource: resource.to_string(),
    }
}

#[tokio::test]
async fn test_validate_only_runs_every_check_in_parallel() {
    let env = TestEnv::new();
    env.recorder.set_delay(Duration::from_millis(200));
    let mut scenario = env.scenario(
        r#"
name: validate-only
provision:
  - name: web
    provider: { name: fake, credential: fake-cred }
  - name: db
    provider: { name: fake, credential: fake-cred }
orchestrate:
  - name: install
    hosts: [web, db]
"#,
    );
    let options = RunOptions::default();

    let pipeline = PipelineBuilder::new(&scenario, &options).build(TaskKind::Validate).unwrap();
    assert_eq!(pipeline.len(), 3, "Two assets and one action should each emit a validate task");
    assert!(pipeline.tasks().iter().all(|task| task.concurrent), "Validate tasks should be concurrent");

    let report = env.driver().validate(&mut scenario, &options).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.status, ExitStatus::Success);
    assert!(report.failed_tasks.is_empty(), "No validate task should fail");
    assert_eq!(report.passed_tasks.len(), 3);
    assert_eq!(report.phases.len(), 1, "Only the validate phase should run");

    let mut validated = env.recorder.calls_of("validate");
    validated.sort();
    assert_eq!(validated, vec!["db", "install", "web"]);
    assert_eq!(env.recorder.peak(), 3, "All three validate tasks should overlap");
    assert!(env.recorder.calls_of("create").is_empty(), "Validate must not provision anything");
}

#[tokio::test]
async fn test_orchestrate_failure_keeps_execute_and_cleans_up_in_reverse() {
    let env = TestEnv::with_config(|config| config.with_task_concurrency(TaskKind::Cleanup, false));
    env.recorder.fail_on("host:install@a_1");
    let mut scenario = env.scenario(
        r#"
name: orchestrate-failure
provision:
  - name: a
    provider: { name: fake, credential: fake-cred, count: 2 }
orchestrate:
  - name: install
    hosts: [a]
execute:
  - name: smoke
    hosts: [a]
"#,
    );

    let driver = env.driver();
    let report = driver.run(&mut scenario, &RunOptions::default()).await;

    let names: Vec<&str> = scenario.assets().iter().map(|asset| asset.name()).collect();
    assert_eq!(names, vec!["a_0", "a_1"], "count=2 should expand the asset into two children");
    assert!(scenario.assets().iter().all(|asset| asset.is_concrete()));
    assert!(scenario.assets().iter().all(|asset| asset.expanded_from() == Some("a")));

    assert_eq!(report.failed_tasks, vec![record(TaskKind::Orchestrate, "install")]);
    assert_eq!(scenario.actions()[0].status(), 1);
    assert!(scenario.actions()[0].base().last_error().unwrap().contains("install@a_1"));

    assert_eq!(env.recorder.calls_of("run"), vec!["install", "smoke"], "Execute should still run");
    assert_eq!(scenario.executes()[0].status(), 0);
    assert_eq!(scenario.executes()[0].artifacts(), ["smoke-results.xml"]);

    assert_eq!(env.recorder.calls_of("delete"), vec!["a_1", "a_0"], "Cleanup should run in reverse provision order");
    assert!(
        !driver.runner().inventory().master_path().exists(),
        "Deleted hosts should leave the master inventory"
    );

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.status, ExitStatus::PhaseFailure);
}

#[tokio::test]
async fn test_label_filter_keeps_matching_actions_in_order() {
    let env = TestEnv::new();
    let scenario = env.scenario(
        r#"
name: labels
provision:
  - name: host
    ip_address: 192.168.10.5
orchestrate:
  - name: first
    hosts: [host]
    labels: [L1]
  - name: second
    hosts: [host]
    labels: [L2]
  - name: third
    hosts: [host]
    labels: [L1, L3]
"#,
    );
    let options = RunOptions::default().with_labels(["L1"]);

    let pipeline = PipelineBuilder::new(&scenario, &options).build(TaskKind::Orchestrate).unwrap();

    assert_eq!(pipeline.resource_names(), vec!["first", "third"]);
    for task in pipeline.tasks() {
        let labels = match &task.payload {
            TaskPayload::Action { action, .. } => action.labels().clone(),
            other => panic!("Expected an action payload, got {:?}", other),
        };
        assert!(labels.contains("L1"), "Every kept action should carry L1");
    }

    let provision = PipelineBuilder::new(&scenario, &options).build(TaskKind::Provision).unwrap();
    assert!(provision.is_empty(), "The unlabeled asset should be filtered out");
}

#[tokio::test]
async fn test_included_scenario_shadows_parent_asset() {
    let env = TestEnv::new();
    let folder = env.dir.path().join("scenarios");
    fs::create_dir_all(&folder).unwrap();
    fs::write(
        folder.join("parent.yml"),
        r#"
name: parent
include: [child.yml]
provision:
  - name: p
    ip_address: 10.1.0.1
"#,
    )
    .unwrap();
    fs::write(
        folder.join("child.yml"),
        r#"
name: child
provision:
  - name: p
    ip_address: 10.2.0.1
"#,
    )
    .unwrap();

    let scenario = env.carbon.load_scenario(&folder.join("parent.yml")).unwrap();
    assert_eq!(scenario.child_scenarios().len(), 1);

    let options = RunOptions::default();
    let pipeline = PipelineBuilder::new(&scenario, &options).build(TaskKind::Provision).unwrap();

    assert_eq!(pipeline.len(), 1, "The shadowed parent asset should not get a task");
    let task = &pipeline.tasks()[0];
    assert_eq!(task.resource.scope, vec![0], "The task should point into the child scenario");
    match &task.payload {
        TaskPayload::Asset(asset) => assert_eq!(asset.ip_address(), Some("10.2.0.1")),
        other => panic!("Expected an asset payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cleanup_runs_in_reverse_and_survives_a_failure() {
    let env = TestEnv::with_config(|config| config.with_task_concurrency(TaskKind::Cleanup, false));
    env.recorder.fail_on("delete:b");
    let mut scenario = env.scenario(
        r#"
name: cleanup-order
provision:
  - name: a
    provider: { name: fake, credential: fake-cred }
  - name: b
    provider: { name: fake, credential: fake-cred }
  - name: c
    provider: { name: fake, credential: fake-cred }
notifications:
  - name: mail
    on_failure: true
"#,
    );
    let options = RunOptions::default();

    let provision = PipelineBuilder::new(&scenario, &options).build(TaskKind::Provision).unwrap();
    let cleanup = PipelineBuilder::new(&scenario, &options).build(TaskKind::Cleanup).unwrap();
    let mut reversed = provision.resource_names();
    reversed.reverse();
    assert_eq!(cleanup.resource_names(), reversed);
    assert_eq!(cleanup.resource_names(), vec!["c", "b", "a"]);

    let report = env.driver().run(&mut scenario, &options).await;

    assert_eq!(env.recorder.calls_of("delete"), vec!["c", "b", "a"]);
    assert_eq!(report.failed_tasks, vec![record(TaskKind::Cleanup, "b")]);
    assert_eq!(report.exit_code(), 0, "Cleanup failures do not change the exit code");
    assert_eq!(
        env.recorder.calls_of("notify"),
        vec!["mail@on_failure"],
        "A failed cleanup still reports the run as failed"
    );
}

#[tokio::test]
async fn test_on_tasks_notification_fires_after_provision_only() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(
        r#"
name: on-tasks
provision:
  - name: host
    provider: { name: fake, credential: fake-cred }
notifications:
  - name: provisioned
    on_tasks: [provision]
"#,
    );
    let options = RunOptions::default();
    let registry = env.carbon.registry();
    let summary = RunSummary::default();

    let builder = NotificationPipelineBuilder::new(&scenario, &options, registry);
    let after_provision = builder.build(Trigger::OnTasks(TaskKind::Provision), &summary);
    assert_eq!(after_provision.resource_names(), vec!["provisioned"]);
    for kind in [TaskKind::Validate, TaskKind::Orchestrate, TaskKind::Execute, TaskKind::Report, TaskKind::Cleanup] {
        let pipeline = builder.build(Trigger::OnTasks(kind), &summary);
        assert!(pipeline.is_empty(), "The notification should not fire after {}", kind);
    }

    env.recorder.fail_on("create:host");
    let report = env.driver().run(&mut scenario, &options).await;

    assert_eq!(report.exit_code(), 1, "A provision failure is a phase failure");
    assert_eq!(
        env.recorder.calls_of("notify"),
        vec!["provisioned@on_tasks:provision"],
        "The notification fires once, whatever the provision outcome"
    );
    assert_eq!(
        scenario.notifications()[0].last_dispatched(),
        Some(Trigger::OnTasks(TaskKind::Provision))
    );
}
