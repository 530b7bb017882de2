//! Plain-text listing of compiled pipelines.
use std::fmt::Write;

use crate::pipeline::Pipeline;
use crate::resources::Resource;
use crate::task::{TaskDescriptor, TaskPayload};

/// One line per task: position, resource, methods, concurrency, and resolved hosts
pub fn describe_task(index: usize, task: &TaskDescriptor) -> String {
    let methods: Vec<String> = task.method_names().iter().map(ToString::to_string).collect();
    let methods = if methods.is_empty() { "-".to_string() } else { methods.join(",") };
    let mode = if task.concurrent { "parallel" } else { "serial" };
    let mut line = format!(
        "{:>3}. {} '{}' [{}] {}",
        index + 1,
        task.resource.kind,
        task.resource.name,
        methods,
        mode
    );
    let targets = match &task.payload {
        TaskPayload::Action { hosts, .. } | TaskPayload::Execute { hosts, .. } => {
            Some(hosts.names().join(", "))
        }
        TaskPayload::Report { executes, .. } => Some(
            executes
                .iter()
                .map(|execute| execute.name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    };
    if let Some(targets) = targets {
        let _ = write!(line, " -> {}", targets);
    }
    line
}

/// Render pipelines in order, one block per pipeline
pub fn render(pipelines: &[Pipeline]) -> String {
    let mut out = String::new();
    for pipeline in pipelines {
        let _ = writeln!(out, "{} ({} task(s))", pipeline.name(), pipeline.len());
        for (index, task) in pipeline.tasks().iter().enumerate() {
            let _ = writeln!(out, "{}", describe_task(index, task));
        }
    }
    out
}
