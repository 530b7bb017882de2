//! Process logging for Carbon.
//!
//! Two sinks share one `tracing` registry:
//!
//! - stderr, at the configured `LOG_LEVEL`, one line per event
//! - `<DATA_FOLDER>/logs/carbon_scenario.log`, always at `debug`, with targets
//!   and thread names so plugin tracebacks can be followed across workers
//!
//! The core logs through the `log` facade; [`LoggingPlugin::init`] installs the
//! `tracing-log` bridge so those records reach both sinks.
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use carbon_core::kernel::constants::DEBUG_LOG_FILE;
use carbon_core::plugin_system::traits::Plugin;
use carbon_core::storage::Config;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Unknown log level '{0}' (expected one of error, warn, info, debug, trace)")]
    InvalidLevel(String),

    #[error("Cannot open debug log {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Where the debug log of a run goes
pub fn log_file_path(config: &Config) -> PathBuf {
    config.logs_folder().join(DEBUG_LOG_FILE)
}

/// Parse a `LOG_LEVEL` value. `warning` is accepted for `warn`.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "error" => Ok(LevelFilter::ERROR),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        "off" => Ok(LevelFilter::OFF),
        other => Err(LoggingError::InvalidLevel(other.to_string())),
    }
}

/// What [`LoggingPlugin::init`] set up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingHandle {
    pub level: LevelFilter,
    pub log_file: PathBuf,
}

/// Statically registered logging plugin
#[derive(Debug, Default)]
pub struct LoggingPlugin;

impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        "core-logging"
    }
}

impl LoggingPlugin {
    /// Install the process-wide subscriber. Fails when called a second time.
    pub fn init(&self, config: &Config) -> Result<LoggingHandle, LoggingError> {
        let level = parse_level(config.log_level())?;
        let log_file = log_file_path(config);
        let file = open_log_file(&log_file)?;

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(level);
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_filter(LevelFilter::DEBUG);
        let subscriber = Registry::default().with(stderr_layer).with(file_layer);

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        tracing_log::LogTracer::init().map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        log::debug!("{} writing debug log to {}", self.name(), log_file.display());
        Ok(LoggingHandle { level, log_file })
    }
}

fn open_log_file(path: &Path) -> Result<fs::File, LoggingError> {
    let to_error = |source| LoggingError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_error)?;
    }
    OpenOptions::new().create(true).append(true).open(path).map_err(to_error)
}
