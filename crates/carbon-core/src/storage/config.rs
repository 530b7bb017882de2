use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kernel::constants::{
    ARTIFACTS_DIR_NAME, DEFAULT_DATA_FOLDER, DEFAULT_FORKS, DEFAULT_LOCK_SLEEP_SECS,
    DEFAULT_LOCK_TIMEOUT_SECS, ENV_OVERRIDE_PREFIX, INVENTORY_DIR_NAME, LOCAL_SETTINGS_FILE,
    LOGS_DIR_NAME, RESULTS_DIR_NAME, SETTINGS_ENV, SYSTEM_SETTINGS_FILE,
};
use crate::storage::error::{StorageResult, StorageSystemError};
use crate::storage::provider::StorageProvider;
use crate::task::TaskKind;

/// Section holding the scalar settings
const DEFAULTS_SECTION: &str = "defaults";

/// Scalar keys that may be overridden from the environment
const SCALAR_KEYS: &[&str] = &[
    "data_folder",
    "results_folder",
    "inventory_folder",
    "workspace",
    "log_level",
    "resource_check_endpoint",
    "forks",
    "lock_timeout",
    "lock_sleep",
];

/// Supported settings file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml)
    Yaml,
    /// TOML format (.cfg, .toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the canonical name of this format
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension. `carbon.cfg` is read as TOML.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" | "cfg" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of a parsed settings file: section name to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: HashMap<String, Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value, deserialized into `T`. Keys are matched case-insensitively.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.raw(key).and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Raw access to a top-level value
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key).or_else(|| {
            self.values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    /// A named section as a map, if present and a table
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.raw(name).and_then(Value::as_object)
    }

    /// Look up a scalar setting: the `[defaults]` section first, then the top level
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.section(DEFAULTS_SECTION)
            .and_then(|defaults| {
                defaults
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .or_else(|| self.raw(key).filter(|v| !v.is_object()))
    }

    /// Set a scalar setting inside the `[defaults]` section
    pub fn set_setting(&mut self, key: &str, value: Value) {
        let defaults = self
            .values
            .entry(DEFAULTS_SECTION.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = defaults {
            map.retain(|k, _| !k.eq_ignore_ascii_case(key));
            map.insert(key.to_lowercase(), value);
        }
    }

    /// Merge with another config, overriding existing values
    pub fn merge(&mut self, other: &ConfigData) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> StorageResult<Self> {
        let values: HashMap<String, Value> = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| {
                StorageSystemError::DeserializationError { format: format.name().into(), source: Box::new(e) }
            })?,
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| {
                StorageSystemError::DeserializationError { format: format.name().into(), source: Box::new(e) }
            })?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| {
                StorageSystemError::DeserializationError { format: format.name().into(), source: Box::new(e) }
            })?,
        };
        Ok(Self { values })
    }
}

/// A named credential table from the `credentials` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Process-wide, immutable configuration.
///
/// Built once from the settings file (see [`Config::load`]) and shared as
/// `Arc<Config>` by every resource, task, and plugin context of a run.
#[derive(Debug, Clone)]
pub struct Config {
    source: Option<PathBuf>,
    data_folder: PathBuf,
    results_folder: Option<PathBuf>,
    inventory_folder: Option<PathBuf>,
    workspace: PathBuf,
    log_level: String,
    credentials: Vec<Credential>,
    task_concurrency: HashMap<TaskKind, bool>,
    toggles: HashMap<String, bool>,
    resource_check_endpoint: Option<String>,
    forks: usize,
    lock_timeout: Duration,
    lock_sleep: Duration,
    raw: ConfigData,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            data_folder: PathBuf::from(DEFAULT_DATA_FOLDER),
            results_folder: None,
            inventory_folder: None,
            workspace: PathBuf::from("."),
            log_level: "info".to_string(),
            credentials: Vec::new(),
            task_concurrency: HashMap::new(),
            toggles: HashMap::new(),
            resource_check_endpoint: None,
            forks: DEFAULT_FORKS,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            lock_sleep: Duration::from_secs(DEFAULT_LOCK_SLEEP_SECS),
            raw: ConfigData::new(),
        }
    }
}

impl Config {
    /// Locate and load the settings file.
    ///
    /// Resolution order: `CARBON_SETTINGS`, `./carbon.cfg`, `/etc/carbon/carbon.cfg`,
    /// then built-in defaults. `CARBON_<KEY>` environment variables override
    /// scalar settings afterwards.
    pub fn load(provider: &dyn StorageProvider) -> StorageResult<Self> {
        let candidates: Vec<PathBuf> = match std::env::var(SETTINGS_ENV) {
            Ok(path) if !path.trim().is_empty() => vec![PathBuf::from(path)],
            _ => vec![PathBuf::from(LOCAL_SETTINGS_FILE), PathBuf::from(SYSTEM_SETTINGS_FILE)],
        };

        for candidate in &candidates {
            if provider.is_file(candidate) {
                return Self::load_from(provider, candidate);
            }
        }

        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            if !path.trim().is_empty() {
                return Err(StorageSystemError::FileNotFound(PathBuf::from(path)));
            }
        }

        log::debug!("No settings file found, using built-in defaults");
        let mut data = ConfigData::new();
        apply_env_overrides(&mut data);
        Self::from_data(data)
    }

    /// Load a specific settings file, then apply environment overrides
    pub fn load_from(provider: &dyn StorageProvider, path: &Path) -> StorageResult<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = provider.read_to_string(path)?;
        let mut data = ConfigData::deserialize(&content, format)?;
        apply_env_overrides(&mut data);
        let mut config = Self::from_data(data)?;
        config.source = Some(path.to_path_buf());
        log::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Build typed settings from parsed data. No environment lookups happen here.
    pub fn from_data(raw: ConfigData) -> StorageResult<Self> {
        let mut config = Config::default();

        if let Some(v) = raw.setting("data_folder") {
            config.data_folder = PathBuf::from(string_setting("data_folder", v)?);
        }
        if let Some(v) = raw.setting("results_folder") {
            config.results_folder = Some(PathBuf::from(string_setting("results_folder", v)?));
        }
        if let Some(v) = raw.setting("inventory_folder") {
            config.inventory_folder = Some(PathBuf::from(string_setting("inventory_folder", v)?));
        }
        if let Some(v) = raw.setting("workspace") {
            config.workspace = PathBuf::from(string_setting("workspace", v)?);
        }
        if let Some(v) = raw.setting("log_level") {
            config.log_level = string_setting("log_level", v)?.to_lowercase();
        }
        if let Some(v) = raw.setting("resource_check_endpoint") {
            let endpoint = string_setting("resource_check_endpoint", v)?;
            config.resource_check_endpoint = (!endpoint.is_empty()).then_some(endpoint);
        }
        if let Some(v) = raw.setting("forks") {
            let forks = u64_setting("forks", v)?;
            if forks == 0 {
                return Err(StorageSystemError::InvalidSetting {
                    key: "forks".into(),
                    reason: "must be at least 1".into(),
                });
            }
            config.forks = forks as usize;
        }
        if let Some(v) = raw.setting("lock_timeout") {
            config.lock_timeout = Duration::from_secs(u64_setting("lock_timeout", v)?);
        }
        if let Some(v) = raw.setting("lock_sleep") {
            config.lock_sleep = Duration::from_secs(u64_setting("lock_sleep", v)?);
        }

        if let Some(section) = raw.section("task_concurrency") {
            for (phase, value) in section {
                let kind: TaskKind = phase.parse().map_err(|reason| StorageSystemError::InvalidSetting {
                    key: format!("task_concurrency.{}", phase),
                    reason,
                })?;
                config.task_concurrency.insert(kind, bool_setting(&format!("task_concurrency.{}", phase), value)?);
            }
        }

        if let Some(section) = raw.section("toggles") {
            for (name, value) in section {
                config
                    .toggles
                    .insert(name.to_lowercase(), bool_setting(&format!("toggles.{}", name), value)?);
            }
        }

        config.credentials = parse_credentials(raw.raw("credentials"))?;
        config.raw = raw;
        Ok(config)
    }

    /// Replace the data folder (consuming builder, used before the config is shared)
    pub fn with_data_folder(mut self, data_folder: impl Into<PathBuf>) -> Self {
        self.data_folder = data_folder.into();
        self
    }

    /// Replace the worker pool ceiling
    pub fn with_forks(mut self, forks: usize) -> Self {
        self.forks = forks.max(1);
        self
    }

    /// Replace the master inventory lock timing
    pub fn with_lock_timing(mut self, timeout: Duration, sleep: Duration) -> Self {
        self.lock_timeout = timeout;
        self.lock_sleep = sleep;
        self
    }

    /// Override the concurrency of one task kind
    pub fn with_task_concurrency(mut self, kind: TaskKind, concurrent: bool) -> Self {
        self.task_concurrency.insert(kind, concurrent);
        self
    }

    /// Add a credential table
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.retain(|c| c.name != credential.name);
        self.credentials.push(credential);
        self
    }

    /// Override the log level
    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_lowercase();
        self
    }

    /// The settings file this config was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn results_folder(&self) -> PathBuf {
        self.results_folder
            .clone()
            .unwrap_or_else(|| self.data_folder.join(RESULTS_DIR_NAME))
    }

    pub fn inventory_folder(&self) -> PathBuf {
        self.inventory_folder
            .clone()
            .unwrap_or_else(|| self.results_folder().join(INVENTORY_DIR_NAME))
    }

    pub fn artifacts_folder(&self) -> PathBuf {
        self.results_folder().join(ARTIFACTS_DIR_NAME)
    }

    pub fn logs_folder(&self) -> PathBuf {
        self.data_folder.join(LOGS_DIR_NAME)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Look up a credential table by name
    pub fn credential(&self, name: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.name == name)
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// Configured concurrency for a task kind, if the settings override it
    pub fn task_concurrency(&self, kind: TaskKind) -> Option<bool> {
        self.task_concurrency.get(&kind).copied()
    }

    /// Feature toggle state; unknown toggles are off
    pub fn toggle(&self, name: &str) -> bool {
        self.toggles.get(&name.to_lowercase()).copied().unwrap_or(false)
    }

    pub fn resource_check_endpoint(&self) -> Option<&str> {
        self.resource_check_endpoint.as_deref()
    }

    pub fn forks(&self) -> usize {
        self.forks
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn lock_sleep(&self) -> Duration {
        self.lock_sleep
    }

    /// A raw section for plugin-specific settings, e.g. `orchestrator.ansible`
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        let mut parts = name.split('.');
        let first = parts.next()?;
        let mut current = self.raw.section(first)?;
        for part in parts {
            current = current.get(part)?.as_object()?;
        }
        Some(current)
    }
}

fn apply_env_overrides(data: &mut ConfigData) {
    for key in SCALAR_KEYS {
        let var = format!("{}{}", ENV_OVERRIDE_PREFIX, key.to_uppercase());
        if let Ok(value) = std::env::var(&var) {
            log::debug!("Setting '{}' overridden from {}", key, var);
            data.set_setting(key, Value::String(value));
        }
    }
}

fn string_setting(key: &str, value: &Value) -> StorageResult<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(StorageSystemError::InvalidSetting {
            key: key.to_string(),
            reason: format!("expected a string, found {}", other),
        }),
    }
}

fn u64_setting(key: &str, value: &Value) -> StorageResult<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| StorageSystemError::InvalidSetting {
        key: key.to_string(),
        reason: format!("expected a non-negative integer, found {}", value),
    })
}

fn bool_setting(key: &str, value: &Value) -> StorageResult<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(|| StorageSystemError::InvalidSetting {
        key: key.to_string(),
        reason: format!("expected a boolean, found {}", value),
    })
}

/// `credentials` is either a table of named tables or a list of tables with a `name` key
fn parse_credentials(value: Option<&Value>) -> StorageResult<Vec<Credential>> {
    let invalid = |reason: &str| StorageSystemError::InvalidSetting {
        key: "credentials".into(),
        reason: reason.to_string(),
    };

    match value {
        None => Ok(Vec::new()),
        Some(Value::Object(named)) => named
            .iter()
            .map(|(name, fields)| {
                let fields = fields
                    .as_object()
                    .cloned()
                    .ok_or_else(|| invalid(&format!("credential '{}' is not a table", name)))?;
                Ok(Credential { name: name.clone(), fields })
            })
            .collect(),
        Some(Value::Array(list)) => list
            .iter()
            .map(|entry| {
                let mut fields = entry
                    .as_object()
                    .cloned()
                    .ok_or_else(|| invalid("credential entries must be tables"))?;
                let name = match fields.remove("name") {
                    Some(Value::String(name)) => name,
                    _ => return Err(invalid("credential entry without a 'name'")),
                };
                Ok(Credential { name, fields })
            })
            .collect(),
        Some(_) => Err(invalid("expected a table or a list of tables")),
    }
}
