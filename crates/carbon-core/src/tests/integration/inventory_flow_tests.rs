#![cfg(test)]

use std::fs;
use std::sync::Arc;

use crate::driver::RunOptions;
use crate::inventory::IniDocument;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::plugin_system::traits::{ExecuteOutput, Executor, Plugin, PluginContext, PluginResult};
use crate::resources::{Execute, Resource, Scenario};
use crate::task::{HostSet, TaskKind};

use super::common::{fake_registry, registry_with, FakeProvisioner, TestEnv};

struct ExplodingExecutor;

impl Plugin for ExplodingExecutor {
    fn name(&self) -> &str {
        "explosive"
    }
}

impl Executor for ExplodingExecutor {
    fn run(&self, _execute: &Execute, _hosts: &HostSet, _context: &PluginContext) -> PluginResult<ExecuteOutput> {
        panic!("executor blew up");
    }
}

const GROUPED: &str = r#"
name: grouped
provision:
  - name: web
    groups: [frontend]
    provider: { name: fake, credential: fake-cred, count: 2 }
    ansible_params:
      ansible_user: cloud-user
  - name: db
    role: backend
    provider: { name: fake, credential: fake-cred }
orchestrate:
  - name: configure-frontend
    hosts: [frontend]
  - name: configure-backend
    hosts: [backend]
"#;

fn build(scenario: &Scenario, kind: TaskKind) -> Pipeline {
    PipelineBuilder::new(scenario, &RunOptions::default()).build(kind).unwrap()
}

#[tokio::test]
async fn test_provision_writes_every_concrete_host_to_master() {
    let env = TestEnv::with(
        |config| config,
        |recorder| registry_with(recorder, FakeProvisioner::new(recorder.clone()).with_addresses("db", &["10.9.9.9"])),
    );
    let driver = env.driver();
    let mut scenario = env.scenario(GROUPED);

    let pipeline = build(&scenario, TaskKind::Provision);
    let report = driver.runner().run(&mut scenario, pipeline).await.unwrap();
    assert!(report.succeeded());
    assert_eq!(report.passed.len(), 2);

    let names: Vec<&str> = scenario.assets().iter().map(|asset| asset.name()).collect();
    assert_eq!(names, vec!["web_0", "web_1", "db"], "count=1 keeps the name, count=2 expands in place");
    assert_eq!(scenario.assets()[2].ip_address(), Some("10.9.9.9"));

    let master = driver.runner().inventory().master_path();
    let document = IniDocument::parse(&fs::read_to_string(&master).unwrap());
    let mut hosts = document.hosts();
    hosts.sort();
    assert_eq!(hosts, vec!["db", "web_0", "web_1"]);
    assert_eq!(document.host_address("db"), Some("10.9.9.9"));
    assert_eq!(document.section("frontend:children").unwrap().lines, vec!["web_0", "web_1"]);
    assert_eq!(document.section("backend:children").unwrap().lines, vec!["db"]);
    assert!(
        document
            .section("web_0:vars")
            .unwrap()
            .lines
            .contains(&"ansible_user=cloud-user".to_string())
    );
}

#[tokio::test]
async fn test_orchestrate_resolves_groups_and_removes_unique_inventories() {
    let env = TestEnv::new();
    let driver = env.driver();
    let mut scenario = env.scenario(GROUPED);

    let provision = build(&scenario, TaskKind::Provision);
    driver.runner().run(&mut scenario, provision).await.unwrap();

    let orchestrate = build(&scenario, TaskKind::Orchestrate);
    let report = driver.runner().run(&mut scenario, orchestrate).await.unwrap();

    assert!(report.succeeded(), "failed: {:?}", report.failed);
    assert_eq!(env.recorder.calls_of("run"), vec!["configure-frontend", "configure-backend"]);
    assert_eq!(
        env.recorder.calls_of("host"),
        vec!["configure-frontend@web_0", "configure-frontend@web_1", "configure-backend@db"]
    );
    assert_eq!(env.recorder.calls_of("inventory"), vec!["configure-frontend", "configure-backend"]);

    let folder = driver.runner().inventory().folder().to_path_buf();
    let leftovers: Vec<String> = fs::read_dir(&folder)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("unique-"))
        .collect();
    assert!(leftovers.is_empty(), "Unique inventories should be deleted: {:?}", leftovers);
}

#[tokio::test]
async fn test_orchestrate_before_provision_reports_unavailable_hosts() {
    let env = TestEnv::new();
    let driver = env.driver();
    let mut scenario = env.scenario(GROUPED);

    let orchestrate = build(&scenario, TaskKind::Orchestrate);
    let report = driver.runner().run(&mut scenario, orchestrate).await.unwrap();

    assert_eq!(report.failed.len(), 2);
    assert!(env.recorder.calls_of("run").is_empty(), "The plugin must not be called without addresses");
    let trace = scenario.actions()[0].base().last_error().unwrap();
    assert!(trace.contains("web"), "{}", trace);
}

#[tokio::test]
async fn test_cleanup_trims_master_inventory() {
    let env = TestEnv::new();
    let driver = env.driver();
    let mut scenario = env.scenario(GROUPED);

    let provision = build(&scenario, TaskKind::Provision);
    driver.runner().run(&mut scenario, provision).await.unwrap();
    let master = driver.runner().inventory().master_path();
    assert!(master.exists());

    env.recorder.fail_on("delete:db");
    let cleanup = build(&scenario, TaskKind::Cleanup);
    assert_eq!(cleanup.resource_names(), vec!["db", "web_1", "web_0"]);
    let report = driver.runner().run(&mut scenario, cleanup).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    let document = IniDocument::parse(&fs::read_to_string(&master).unwrap());
    assert_eq!(document.hosts(), vec!["db"], "Only the host that failed to delete should remain");
}

#[tokio::test]
async fn test_empty_pipeline_is_a_successful_no_op() {
    let env = TestEnv::new();
    let driver = env.driver();
    let mut scenario = env.scenario("name: empty\n");

    for kind in TaskKind::PHASES {
        let pipeline = build(&scenario, kind);
        assert!(pipeline.is_empty());
        let report = driver.runner().run(&mut scenario, pipeline).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.total(), 0);
    }
    assert!(env.recorder.calls().is_empty());
    assert!(!driver.runner().inventory().master_path().exists());
}

#[tokio::test]
async fn test_panicking_plugin_fails_only_its_task() {
    let env = TestEnv::with(
        |config| config,
        |recorder| {
            let mut registry = fake_registry(recorder);
            registry.register_executor(Arc::new(ExplodingExecutor)).unwrap();
            registry
        },
    );
    let driver = env.driver();
    let mut scenario = env.scenario(
        r#"
name: explosive
provision:
  - name: lab
    ip_address: 192.168.1.30
execute:
  - name: boom
    hosts: [lab]
    executor: explosive
  - name: fine
    hosts: [lab]
"#,
    );

    let pipeline = build(&scenario, TaskKind::Execute);
    let report = driver.runner().run(&mut scenario, pipeline).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].resource, "boom");
    assert_eq!(report.passed[0].resource, "fine");
    assert_eq!(scenario.executes()[0].status(), 1);
    assert_eq!(scenario.ledger().lock().failed_in(TaskKind::Execute), 1);
    assert_eq!(env.recorder.calls_of("run"), vec!["fine"]);
}

#[tokio::test]
async fn test_parallel_tasks_finish_before_serial_ones_start() {
    let env = TestEnv::new();
    env.recorder.set_delay(std::time::Duration::from_millis(100));
    let driver = env.driver();
    let mut scenario = env.scenario(
        r#"
name: mixed
provision:
  - name: lab
    ip_address: 192.168.1.40
execute:
  - name: serial-one
    hosts: [lab]
  - name: parallel-one
    hosts: [lab]
    concurrent: true
  - name: serial-two
    hosts: [lab]
  - name: parallel-two
    hosts: [lab]
    concurrent: true
"#,
    );

    let pipeline = build(&scenario, TaskKind::Execute);
    let concurrency: Vec<bool> = pipeline.tasks().iter().map(|task| task.concurrent).collect();
    assert_eq!(concurrency, vec![false, true, false, true]);

    let report = driver.runner().run(&mut scenario, pipeline).await.unwrap();
    assert!(report.succeeded());

    let runs = env.recorder.calls_of("run");
    let mut parallel = runs[..2].to_vec();
    parallel.sort();
    assert_eq!(parallel, vec!["parallel-one", "parallel-two"]);
    assert_eq!(runs[2..], ["serial-one", "serial-two"]);
    assert_eq!(env.recorder.peak(), 2);
}

#[tokio::test]
async fn test_forks_bound_the_worker_pool() {
    let env = TestEnv::with_config(|config| config.with_forks(2));
    env.recorder.set_delay(std::time::Duration::from_millis(100));
    let driver = env.driver();
    let mut scenario = env.scenario(
        r#"
name: forks
provision:
  - { name: a, provider: { name: fake } }
  - { name: b, provider: { name: fake } }
  - { name: c, provider: { name: fake } }
  - { name: d, provider: { name: fake } }
"#,
    );

    let pipeline = build(&scenario, TaskKind::Validate);
    let report = driver.runner().run(&mut scenario, pipeline).await.unwrap();

    assert_eq!(report.passed.len(), 4);
    assert_eq!(env.recorder.peak(), 2);
}
