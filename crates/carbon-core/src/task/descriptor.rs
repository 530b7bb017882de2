use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::plugin_system::traits::{CreateResult, ExecuteOutput, ImportResult};
use crate::resources::notification::Trigger;
use crate::resources::{Action, Asset, Execute, Notification, Report, Resource, ResourceKey};
use crate::task::TaskKind;

/// One plugin entry point a task invokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Registry and credential checks, then the plugin's own `validate()`
    Validate,
    Authenticate,
    Create,
    Delete,
    Run,
    ImportArtifacts,
    Notify,
    /// Scenario-level pre-flight check of external services
    CheckResources,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Validate => "validate",
            Method::Authenticate => "authenticate",
            Method::Create => "create",
            Method::Delete => "delete",
            Method::Run => "run",
            Method::ImportArtifacts => "import_artifacts",
            Method::Notify => "notify",
            Method::CheckResources => "check_resources",
        };
        f.write_str(name)
    }
}

/// What a method invocation handed back
#[derive(Debug, Clone)]
pub enum MethodReturn {
    Unit,
    Created(CreateResult),
    Executed(ExecuteOutput),
    Imported(Vec<ImportResult>),
}

/// A method-invocation record. The runner fills `returned` as it goes.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: Method,
    pub returned: Option<MethodReturn>,
}

impl MethodCall {
    pub fn new(method: Method) -> Self {
        Self { method, returned: None }
    }
}

/// A task a resource declares for one kind, before references are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredTask {
    pub kind: TaskKind,
    pub methods: Vec<Method>,
}

impl DeclaredTask {
    pub fn new(kind: TaskKind, methods: Vec<Method>) -> Self {
        Self { kind, methods }
    }
}

/// Hosts an action or execute resolved to, plus the global view
#[derive(Debug, Clone, Default)]
pub struct HostSet {
    pub hosts: Vec<Asset>,
    pub all_hosts: Vec<Asset>,
}

impl HostSet {
    /// Hosts that carry an `ip_address`
    pub fn concrete(&self) -> impl Iterator<Item = &Asset> {
        self.hosts.iter().filter(|asset| asset.is_concrete())
    }

    pub fn names(&self) -> Vec<&str> {
        self.hosts.iter().map(|asset| asset.name()).collect()
    }
}

/// Owned snapshot of everything a task's plugin calls read
#[derive(Debug, Clone)]
pub enum TaskPayload {
    Scenario {
        name: String,
        resource_check: Option<Value>,
    },
    Asset(Asset),
    /// An orchestrate task, or the cleanup action of an action during cleanup
    Action {
        action: Action,
        hosts: HostSet,
    },
    Execute {
        execute: Execute,
        hosts: HostSet,
    },
    Report {
        report: Report,
        executes: Vec<Execute>,
        hosts: Vec<Asset>,
    },
    Notification {
        notification: Notification,
        summary: RunSummary,
    },
}

/// A compiled unit of work: one resource, one kind, a method list
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    pub resource: ResourceKey,
    pub payload: TaskPayload,
    pub concurrent: bool,
    pub methods: Vec<MethodCall>,
}

impl TaskDescriptor {
    pub fn new(kind: TaskKind, resource: ResourceKey, payload: TaskPayload, concurrent: bool, methods: &[Method]) -> Self {
        Self {
            kind,
            resource,
            payload,
            concurrent,
            methods: methods.iter().copied().map(MethodCall::new).collect(),
        }
    }

    /// `<kind>/<resource>`, the name recorded in the pass/fail ledger
    pub fn name(&self) -> String {
        format!("{}/{}", self.kind, self.resource.name)
    }

    pub fn record(&self) -> TaskRecord {
        TaskRecord {
            kind: self.kind,
            resource: self.resource.name.clone(),
        }
    }

    pub fn method_names(&self) -> Vec<Method> {
        self.methods.iter().map(|call| call.method).collect()
    }
}

/// A finished task in the scenario's passed/failed lists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskRecord {
    pub kind: TaskKind,
    pub resource: String,
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.resource)
    }
}

/// Run status handed to notifiers
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub trigger: Option<Trigger>,
    pub passed_tasks: Vec<TaskRecord>,
    pub failed_tasks: Vec<TaskRecord>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed_tasks.is_empty()
    }
}
