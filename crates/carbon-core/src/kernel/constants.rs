use semver::Version;

/// Application name
pub const APP_NAME: &str = "carbon";

/// Current plugin API version. Plugins declare the ranges they are compatible with.
pub const API_VERSION: Version = Version::new(0, 1, 0);

/// Environment variable naming an alternative settings file
pub const SETTINGS_ENV: &str = "CARBON_SETTINGS";

/// Prefix for per-key environment overrides, e.g. `CARBON_DATA_FOLDER`
pub const ENV_OVERRIDE_PREFIX: &str = "CARBON_";

/// Settings file looked up in the current directory
pub const LOCAL_SETTINGS_FILE: &str = "carbon.cfg";

/// System-wide settings file
pub const SYSTEM_SETTINGS_FILE: &str = "/etc/carbon/carbon.cfg";

/// Default data folder
pub const DEFAULT_DATA_FOLDER: &str = "/tmp";

/// Results folder name created under the data folder when none is configured
pub const RESULTS_DIR_NAME: &str = ".results";

/// Inventory folder name created under the results folder when none is configured
pub const INVENTORY_DIR_NAME: &str = "inventory";

/// Artifact folder name under the results folder
pub const ARTIFACTS_DIR_NAME: &str = "artifacts";

/// Log folder name under the data folder
pub const LOGS_DIR_NAME: &str = "logs";

/// Asset files (keys, certificates) referenced by relative name live here, under the data folder
pub const ASSETS_DIR_NAME: &str = "assets";

/// Debug log file written by the logging plugin
pub const DEBUG_LOG_FILE: &str = "carbon_scenario.log";

/// Results snapshot file written under the results folder
pub const RESULTS_FILE: &str = "results.yml";

/// Default worker pool ceiling
pub const DEFAULT_FORKS: usize = 100;

/// Default master inventory lock timeout, in seconds
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 120;

/// Default sleep between lock attempts, in seconds
pub const DEFAULT_LOCK_SLEEP_SECS: u64 = 5;

/// Host keyword selecting every asset in scope
pub const ALL_HOSTS: &str = "all";

/// Default orchestrator plugin name
pub const DEFAULT_ORCHESTRATOR: &str = "ansible";

/// Default executor plugin name
pub const DEFAULT_EXECUTOR: &str = "runner";

/// Provisioner used for assets that carry an `ip_address` and no provider
pub const STATIC_PROVISIONER: &str = "static";

/// Default notifier plugin name
pub const DEFAULT_NOTIFIER: &str = "email-notifier";

/// Master inventory lock file name, inside the inventory folder
pub const INVENTORY_LOCK_FILE: &str = ".lock";
