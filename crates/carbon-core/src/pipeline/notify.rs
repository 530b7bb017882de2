//! Notification pipelines, one per trigger.
use crate::driver::RunOptions;
use crate::pipeline::Pipeline;
use crate::plugin_system::PluginRegistry;
use crate::resources::notification::Trigger;
use crate::resources::{Resource, ResourceKey, ResourceType, Scenario};
use crate::task::{Method, RunSummary, TaskDescriptor, TaskKind, TaskPayload};

/// Selects the notifications a trigger fires and compiles them into a pipeline
pub struct NotificationPipelineBuilder<'a> {
    scenario: &'a Scenario,
    options: &'a RunOptions,
    registry: &'a PluginRegistry,
}

impl<'a> NotificationPipelineBuilder<'a> {
    pub fn new(scenario: &'a Scenario, options: &'a RunOptions, registry: &'a PluginRegistry) -> Self {
        Self {
            scenario,
            options,
            registry,
        }
    }

    /// Notifications matching `trigger`, in declaration order. Each task carries
    /// a copy of `summary`.
    pub fn build(&self, trigger: Trigger, summary: &RunSummary) -> Pipeline {
        let selected = self.options.selected_phases();
        let config = self.scenario.context().config();
        let mut summary = summary.clone();
        summary.trigger = Some(trigger);

        let tasks: Vec<TaskDescriptor> = self
            .scenario
            .get_all_notifications()
            .into_iter()
            .filter(|(_, notification)| {
                if self.options.skip_notify.contains(notification.name()) {
                    log::debug!("Notification '{}' skipped on request", notification.name());
                    return false;
                }
                true
            })
            .filter(|(_, notification)| self.options.keeps(notification.labels()))
            .filter(|(_, notification)| notification.notify_on().matches(trigger, &selected))
            .map(|(scope, notification)| {
                let plugin_level = self.registry.notifier_concurrency(notification.notifier());
                let concurrent = TaskKind::Notification.resolve_concurrency(
                    notification.base().concurrent().or(plugin_level),
                    config.task_concurrency(TaskKind::Notification),
                );
                TaskDescriptor::new(
                    TaskKind::Notification,
                    ResourceKey::new(ResourceType::Notification, &scope, notification.name()),
                    TaskPayload::Notification {
                        notification: notification.clone(),
                        summary: summary.clone(),
                    },
                    concurrent,
                    &[Method::Notify],
                )
            })
            .collect();

        if !tasks.is_empty() {
            log::debug!("{} notification(s) match {}", tasks.len(), trigger);
        }
        Pipeline::new(format!("notify/{}", trigger), TaskKind::Notification, tasks)
    }
}
