pub mod driver;
pub mod inventory;
pub mod kernel;
pub mod pipeline;
pub mod plugin_system;
pub mod resources;
pub mod runner;
pub mod storage;
pub mod task;

// Re-export key public types for the binary and plugin crates
pub use kernel::Carbon;
pub use kernel::error::Error as KernelError;
pub use driver::{CancelFlag, ExitStatus, RunOptions, RunReport, ScenarioDriver};
pub use pipeline::{NotificationPipelineBuilder, Pipeline, PipelineBuilder};
pub use plugin_system::PluginRegistry;
pub use resources::Scenario;
pub use runner::TaskRunner;
pub use storage::Config;
pub use task::TaskKind;

#[cfg(test)]
mod tests;
