use std::path::PathBuf;

use carbon_core::RunOptions;
use carbon_core::pipeline::BuilderResult;
use clap::{Args, Parser, Subcommand};

/// Carbon: scenario driven provisioning, configuration, and testing
#[derive(Parser, Debug)]
#[command(name = "carbon", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Settings file, instead of CARBON_SETTINGS or ./carbon.cfg
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Overrides LOG_LEVEL from the settings file
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the scenario and every plugin it names, without provisioning
    Validate {
        #[command(flatten)]
        target: Target,
    },
    /// Run the scenario phases
    Run {
        #[command(flatten)]
        target: Target,

        /// Phase to run, repeatable (validate, provision, orchestrate, execute, report, cleanup)
        #[arg(short = 't', long = "task")]
        tasks: Vec<String>,

        /// Notification to never send, repeatable
        #[arg(long)]
        skip_notify: Vec<String>,
    },
    /// List the tasks each phase would run
    Show {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args, Debug)]
pub struct Target {
    /// Scenario descriptor
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Only resources carrying one of these labels
    #[arg(short, long = "labels")]
    pub labels: Vec<String>,

    /// Leave out resources carrying one of these labels
    #[arg(long)]
    pub skip_labels: Vec<String>,
}

impl Command {
    pub fn target(&self) -> &Target {
        match self {
            Command::Validate { target } | Command::Run { target, .. } | Command::Show { target } => target,
        }
    }

    /// Driver options for this command. Unknown phase names are rejected here.
    pub fn run_options(&self) -> BuilderResult<RunOptions> {
        let target = self.target();
        let mut options = RunOptions::default()
            .with_labels(target.labels.iter().cloned())
            .with_skip_labels(target.skip_labels.iter().cloned());
        if let Command::Run { tasks, skip_notify, .. } = self {
            if !tasks.is_empty() {
                options = options.with_tasks(RunOptions::parse_tasks(tasks)?);
            }
            options = options.with_skip_notify(skip_notify.iter().cloned());
        }
        Ok(options)
    }
}
