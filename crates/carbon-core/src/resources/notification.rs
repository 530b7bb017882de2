use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::kernel::constants::DEFAULT_NOTIFIER;
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::{Resource, ResourceBase, ResourceContext, ResourceType, StringList};
use crate::task::{DeclaredTask, Method, TaskKind};

/// The condition a notification is dispatched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    OnStart,
    OnSuccess,
    OnFailure,
    OnDemand,
    /// A phase finished, whatever its outcome
    OnTasks(TaskKind),
    /// A phase finished with at least one failed task
    OnTasksFailure(TaskKind),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::OnStart => f.write_str("on_start"),
            Trigger::OnSuccess => f.write_str("on_success"),
            Trigger::OnFailure => f.write_str("on_failure"),
            Trigger::OnDemand => f.write_str("on_demand"),
            Trigger::OnTasks(kind) => write!(f, "on_tasks:{}", kind),
            Trigger::OnTasksFailure(kind) => write!(f, "on_tasks_failure:{}", kind),
        }
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Phase restriction on a start, success, or failure trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseFilter {
    All,
    /// Fires only when the run selected at least one of these phases
    Only(Vec<TaskKind>),
}

impl PhaseFilter {
    pub fn matches(&self, selected: &[TaskKind]) -> bool {
        match self {
            PhaseFilter::All => true,
            PhaseFilter::Only(phases) => phases.iter().any(|phase| selected.contains(phase)),
        }
    }
}

/// The single trigger class a notification declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyOn {
    Start(PhaseFilter),
    Success(PhaseFilter),
    Failure(PhaseFilter),
    Tasks(Vec<TaskKind>),
    TasksFailure(Vec<TaskKind>),
    Demand,
}

impl NotifyOn {
    /// Whether a dispatch for `trigger`, in a run that selected `selected`, includes this notification
    pub fn matches(&self, trigger: Trigger, selected: &[TaskKind]) -> bool {
        match (self, trigger) {
            (NotifyOn::Start(filter), Trigger::OnStart)
            | (NotifyOn::Success(filter), Trigger::OnSuccess)
            | (NotifyOn::Failure(filter), Trigger::OnFailure) => filter.matches(selected),
            (NotifyOn::Tasks(phases), Trigger::OnTasks(phase))
            | (NotifyOn::TasksFailure(phases), Trigger::OnTasksFailure(phase)) => phases.contains(&phase),
            (NotifyOn::Demand, Trigger::OnDemand) => true,
            _ => false,
        }
    }
}

/// `on_start: true` or `on_start: [provision, ...]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TriggerValue {
    Flag(bool),
    Phases(StringList),
}

/// A notification as written in a scenario descriptor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: StringList,
    pub notifier: Option<String>,
    pub on_start: Option<TriggerValue>,
    pub on_success: Option<TriggerValue>,
    pub on_failure: Option<TriggerValue>,
    pub on_tasks: Option<StringList>,
    pub on_tasks_failure: Option<StringList>,
    pub on_demand: Option<bool>,
    pub concurrent: Option<bool>,
    /// Notifier settings, opaque to the core
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// A message to emit when its trigger fires
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(flatten)]
    base: ResourceBase,
    notifier: String,
    notify_on: NotifyOn,
    #[serde(skip_serializing_if = "Map::is_empty")]
    params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_dispatched: Option<Trigger>,
}

impl Notification {
    pub fn from_descriptor(descriptor: NotificationDescriptor, context: &ResourceContext) -> ResourceResult<Self> {
        let name = match descriptor.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Notification,
                    resource: "<unnamed>".into(),
                    field: "name".into(),
                });
            }
        };

        let mut declared = Vec::new();
        if let Some(filter) = phase_filter(&name, "on_start", descriptor.on_start)? {
            declared.push(("on_start", NotifyOn::Start(filter)));
        }
        if let Some(filter) = phase_filter(&name, "on_success", descriptor.on_success)? {
            declared.push(("on_success", NotifyOn::Success(filter)));
        }
        if let Some(filter) = phase_filter(&name, "on_failure", descriptor.on_failure)? {
            declared.push(("on_failure", NotifyOn::Failure(filter)));
        }
        if let Some(phases) = descriptor.on_tasks.filter(|list| !list.is_empty()) {
            declared.push(("on_tasks", NotifyOn::Tasks(parse_phases(&name, "on_tasks", phases)?)));
        }
        if let Some(phases) = descriptor.on_tasks_failure.filter(|list| !list.is_empty()) {
            declared.push((
                "on_tasks_failure",
                NotifyOn::TasksFailure(parse_phases(&name, "on_tasks_failure", phases)?),
            ));
        }
        if descriptor.on_demand.unwrap_or(false) {
            declared.push(("on_demand", NotifyOn::Demand));
        }

        let notify_on = match declared.len() {
            0 => {
                return Err(ResourceError::MissingField {
                    kind: ResourceType::Notification,
                    resource: name,
                    field: "trigger (one of on_start, on_success, on_failure, on_tasks, on_tasks_failure, on_demand)"
                        .into(),
                });
            }
            1 => declared.remove(0).1,
            _ => {
                return Err(ResourceError::ConflictingFields {
                    kind: ResourceType::Notification,
                    resource: name,
                    first: declared[0].0.to_string(),
                    second: declared[1].0.to_string(),
                });
            }
        };

        let base = ResourceBase::new(name, context)
            .with_description(descriptor.description)
            .with_labels(descriptor.labels.into_vec())
            .with_concurrent(descriptor.concurrent);

        Ok(Self {
            base,
            notifier: descriptor.notifier.unwrap_or_else(|| DEFAULT_NOTIFIER.to_string()),
            notify_on,
            params: descriptor.params,
            last_dispatched: None,
        })
    }

    pub fn notifier(&self) -> &str {
        &self.notifier
    }

    pub fn notify_on(&self) -> &NotifyOn {
        &self.notify_on
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn last_dispatched(&self) -> Option<Trigger> {
        self.last_dispatched
    }

    pub fn set_dispatched(&mut self, trigger: Trigger) {
        self.last_dispatched = Some(trigger);
    }

    pub fn mark_passed(&mut self) {
        self.base.mark_passed();
    }

    pub fn mark_failed(&mut self, trace: impl Into<String>) {
        self.base.mark_failed(trace);
    }
}

impl Resource for Notification {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Notification
    }

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn get_tasks(&self) -> Vec<DeclaredTask> {
        vec![
            DeclaredTask::new(TaskKind::Validate, vec![Method::Validate]),
            DeclaredTask::new(TaskKind::Notification, vec![Method::Notify]),
        ]
    }

    fn plugin_name(&self) -> Option<&str> {
        Some(&self.notifier)
    }
}

fn phase_filter(resource: &str, field: &str, value: Option<TriggerValue>) -> ResourceResult<Option<PhaseFilter>> {
    match value {
        None | Some(TriggerValue::Flag(false)) => Ok(None),
        Some(TriggerValue::Flag(true)) => Ok(Some(PhaseFilter::All)),
        Some(TriggerValue::Phases(phases)) if phases.is_empty() => Ok(None),
        Some(TriggerValue::Phases(phases)) => Ok(Some(PhaseFilter::Only(parse_phases(resource, field, phases)?))),
    }
}

fn parse_phases(resource: &str, field: &str, phases: StringList) -> ResourceResult<Vec<TaskKind>> {
    phases
        .into_vec()
        .iter()
        .map(|phase| {
            phase
                .parse::<TaskKind>()
                .ok()
                .filter(TaskKind::is_phase)
                .ok_or_else(|| ResourceError::InvalidField {
                    kind: ResourceType::Notification,
                    resource: resource.to_string(),
                    field: field.to_string(),
                    reason: format!("'{}' is not a phase name", phase),
                })
        })
        .collect()
}
