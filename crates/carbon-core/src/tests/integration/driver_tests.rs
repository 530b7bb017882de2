#![cfg(test)]

use std::fs;

use crate::driver::{ExitStatus, RunOptions};
use crate::kernel::constants::RESULTS_FILE;
use crate::resources::Resource;
use crate::task::TaskKind;

use super::common::TestEnv;

const TWO_HOSTS: &str = r#"
name: two-hosts
provision:
  - name: web
    provider: { name: fake, credential: fake-cred }
  - name: db
    provider: { name: fake, credential: fake-cred }
orchestrate:
  - name: install
    hosts: all
execute:
  - name: smoke
    hosts: [web]
report:
  - name: import
    executes: [smoke]
    importer: polarion
notifications:
  - name: started
    on_start: true
  - name: done
    on_success: true
  - name: broken
    on_failure: true
  - name: later
    on_demand: true
"#;

#[tokio::test]
async fn test_full_run_succeeds_in_phase_order() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.status, ExitStatus::Success, "unexpected failure: {:?}", report.error);
    assert!(report.failed_tasks.is_empty());
    let kinds: Vec<TaskKind> = report.phases.iter().map(|phase| phase.kind).collect();
    assert_eq!(kinds, TaskKind::PHASES.to_vec());

    let calls = env.recorder.calls();
    let position = |call: &str| calls.iter().position(|c| c == call).unwrap_or_else(|| panic!("{} not called", call));
    assert!(position("notify:started@on_start") < position("validate:web"));
    assert!(position("create:web") < position("run:install"));
    assert!(position("run:install") < position("run:smoke"));
    assert!(position("run:smoke") < position("import:import"));
    assert!(position("import:import") < position("delete:web"));
    assert!(position("delete:web") < position("notify:done@on_success"));
    assert!(position("notify:done@on_success") < position("notify:later@on_demand"));
    assert!(env.recorder.calls_of("notify").iter().all(|call| !call.starts_with("broken")));

    assert_eq!(env.recorder.calls_of("inventory"), vec!["install"], "The action should see its unique inventory");
    assert_eq!(scenario.reports()[0].import_results().len(), 1);
    assert_eq!(scenario.reports()[0].import_results()[0].artifact, "smoke-results.xml");
}

#[tokio::test]
async fn test_validate_failure_aborts_without_cleanup() {
    let env = TestEnv::new();
    env.recorder.fail_on("validate:db");
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.status, ExitStatus::Aborted);
    assert_eq!(report.phases.len(), 1, "Nothing should run after validate");
    assert!(env.recorder.calls_of("create").is_empty());
    assert!(env.recorder.calls_of("delete").is_empty(), "An aborted run has nothing to clean up");
    assert_eq!(
        env.recorder.calls_of("notify"),
        vec!["started@on_start", "broken@on_failure", "later@on_demand"]
    );
    assert_eq!(scenario.assets()[1].status(), 1);
}

#[tokio::test]
async fn test_unresolved_hosts_abort_before_provision() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(
        r#"
name: dangling
provision:
  - name: web
    provider: { name: fake, credential: fake-cred }
orchestrate:
  - name: install
    hosts: [missing]
"#,
    );

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.exit_code(), 2);
    assert!(report.error.as_deref().unwrap().contains("missing"));
    assert!(env.recorder.calls_of("create").is_empty());
    assert!(env.recorder.calls_of("delete").is_empty());
}

#[tokio::test]
async fn test_unresolved_cleanup_hosts_abort_before_provision() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(
        r#"
name: dangling-cleanup
provision:
  - name: web
    provider: { name: fake, credential: fake-cred }
orchestrate:
  - name: install
    hosts: [web]
    cleanup:
      name: uninstall
      hosts: [ghost]
"#,
    );

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.exit_code(), 2);
    assert!(report.error.as_deref().unwrap().contains("ghost"));
    assert!(env.recorder.calls_of("create").is_empty(), "Nothing may be provisioned");
    assert!(env.recorder.calls_of("delete").is_empty());
}

#[tokio::test]
async fn test_exclusive_labels_are_rejected() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(TWO_HOSTS);
    let options = RunOptions::default().with_labels(["a"]).with_skip_labels(["b"]);

    let report = env.driver().run(&mut scenario, &options).await;

    assert_eq!(report.exit_code(), 2);
    assert!(report.phases.is_empty());
    assert!(env.recorder.calls().is_empty(), "No plugin should be called");
}

#[tokio::test]
async fn test_provision_failure_skips_to_cleanup() {
    let env = TestEnv::new();
    env.recorder.fail_on("create:db");
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.exit_code(), 1);
    let kinds: Vec<TaskKind> = report.phases.iter().map(|phase| phase.kind).collect();
    assert_eq!(kinds, vec![TaskKind::Validate, TaskKind::Provision, TaskKind::Cleanup]);
    assert!(env.recorder.calls_of("run").is_empty(), "Orchestrate and execute must not run");
    let mut deleted = env.recorder.calls_of("delete");
    deleted.sort();
    assert_eq!(deleted, vec!["db", "web"]);
    assert!(env.recorder.calls_of("notify").contains(&"broken@on_failure".to_string()));
}

#[tokio::test]
async fn test_master_inventory_conflict_is_fatal_but_cleans_up() {
    let env = TestEnv::new();
    let driver = env.driver();
    let master = driver.runner().inventory().master_path();
    fs::create_dir_all(master.parent().unwrap()).unwrap();
    fs::write(&master, "[web]\nweb\n\n[web:vars]\nansible_host=172.16.0.9\n").unwrap();
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = driver.run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.exit_code(), 3);
    assert_eq!(report.status, ExitStatus::InventoryFailure);
    assert!(env.recorder.calls_of("run").is_empty());
    assert_eq!(env.recorder.calls_of("delete").len(), 2, "Cleanup still runs after an inventory failure");
}

#[tokio::test]
async fn test_cancel_stops_new_tasks_and_still_cleans_up() {
    let env = TestEnv::with_config(|config| config.with_task_concurrency(TaskKind::Provision, false));
    let driver = env.driver();
    env.recorder.cancel_on("create:web", driver.cancel_flag());
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = driver.run(&mut scenario, &RunOptions::default()).await;

    assert!(report.cancelled);
    assert_eq!(env.recorder.calls_of("create"), vec!["web"], "db should not start after the cancel");
    let provision = report.phase(TaskKind::Provision).unwrap();
    assert_eq!(provision.skipped.len(), 1);
    assert!(env.recorder.calls_of("run").is_empty());
    let mut deleted = env.recorder.calls_of("delete");
    deleted.sort();
    assert_eq!(deleted, vec!["db", "web"], "Cleanup ignores the cancel");
}

#[tokio::test]
async fn test_notification_failures_do_not_change_the_exit_code() {
    let env = TestEnv::new();
    env.recorder.fail_on("notify:started@on_start");
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.failed_tasks.len(), 1);
    assert_eq!(report.failed_tasks[0].kind, TaskKind::Notification);
    assert!(
        env.recorder.calls_of("notify").contains(&"done@on_success".to_string()),
        "Only phase failures turn the run into a failure"
    );
}

#[tokio::test]
async fn test_skip_notify_drops_named_notifications() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(TWO_HOSTS);
    let options = RunOptions::default().with_skip_notify(["started", "later"]);

    let report = env.driver().run(&mut scenario, &options).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(env.recorder.calls_of("notify"), vec!["done@on_success"]);
}

#[tokio::test]
async fn test_selected_phases_only() {
    let env = TestEnv::new();
    let mut scenario = env.scenario(
        r#"
name: static-only
provision:
  - name: lab
    ip_address: 192.168.1.20
orchestrate:
  - name: install
    hosts: [lab]
"#,
    );
    let options = RunOptions::default().with_tasks([TaskKind::Orchestrate]);

    let report = env.driver().run(&mut scenario, &options).await;

    assert_eq!(report.exit_code(), 0, "unexpected failure: {:?}", report.error);
    let kinds: Vec<TaskKind> = report.phases.iter().map(|phase| phase.kind).collect();
    assert_eq!(kinds, vec![TaskKind::Validate, TaskKind::Orchestrate]);
    assert_eq!(env.recorder.calls_of("run"), vec!["install"]);
}

#[tokio::test]
async fn test_results_snapshot_lists_task_outcomes() {
    let env = TestEnv::new();
    env.recorder.fail_on("run:smoke");
    let mut scenario = env.scenario(TWO_HOSTS);

    let report = env.driver().run(&mut scenario, &RunOptions::default()).await;
    assert_eq!(report.exit_code(), 1);

    let snapshot = env.carbon.config().results_folder().join(RESULTS_FILE);
    let content = fs::read_to_string(&snapshot).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
    let failed: Vec<&str> = parsed["failed_tasks"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|value| value.as_str())
        .collect();
    assert!(failed.contains(&"execute/smoke"));
    assert_eq!(parsed["scenario"]["name"].as_str(), Some("two-hosts"));
}
