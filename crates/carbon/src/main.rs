mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use carbon_core::kernel::error::Result;
use carbon_core::pipeline::show;
use carbon_core::storage::{LocalStorageProvider, StorageProvider};
use carbon_core::{Carbon, Config, PluginRegistry, RunReport};
use clap::Parser;
use core_logging::LoggingPlugin;
use log::{error, info, warn};

use cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    // Statically registered: the logger must exist before anything else logs
    if let Err(e) = LoggingPlugin.init(&config) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(2);
    }

    let code = match execute(args.command, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    ExitCode::from(code as u8)
}

fn load_config(args: &CliArgs) -> Result<Config> {
    let storage = LocalStorageProvider::new(PathBuf::from("."));
    let config = match &args.settings {
        Some(path) => Config::load_from(&storage, path)?,
        None => Config::load(&storage)?,
    };
    Ok(match &args.log_level {
        Some(level) => config.with_log_level(level),
        None => config,
    })
}

async fn execute(command: Command, config: Config) -> Result<i32> {
    let options = command.run_options()?;
    let registry = PluginRegistry::with_builtins()?;
    let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(config.workspace().to_path_buf()));
    let carbon = Carbon::with_storage(config, registry, storage);

    let scenario_path = &command.target().scenario;
    let mut scenario = carbon.load_scenario(scenario_path)?;
    let driver = carbon.driver();

    if let Command::Show { .. } = command {
        let pipelines = driver.show(&scenario, &options)?;
        print!("{}", show::render(&pipelines));
        return Ok(0);
    }

    let cancel = driver.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the running tasks");
            cancel.raise();
        }
    });

    let report = match command {
        Command::Validate { .. } => driver.validate(&mut scenario, &options).await,
        _ => driver.run(&mut scenario, &options).await,
    };
    print_report(&report);
    Ok(report.exit_code())
}

fn print_report(report: &RunReport) {
    for phase in &report.phases {
        println!(
            "{:<12} passed {:>3}  failed {:>3}  skipped {:>3}",
            phase.kind.name(),
            phase.passed.len(),
            phase.failed.len(),
            phase.skipped.len()
        );
    }
    for record in &report.failed_tasks {
        println!("FAILED {}", record);
    }
    if let Some(reason) = &report.error {
        println!("ABORTED {}", reason);
    }
    if report.cancelled {
        println!("CANCELLED");
    }
    info!(
        "Scenario '{}' finished with exit code {} ({} passed, {} failed)",
        report.scenario,
        report.exit_code(),
        report.passed_tasks.len(),
        report.failed_tasks.len()
    );
}

