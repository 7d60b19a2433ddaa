//! Manager configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default debounce interval between a change and the database flush
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Name of the database file under the state directory
pub const DATABASE_NAME: &str = "device-manager";

/// Module arguments accepted by [`ManagerConfig::from_args`]
const VALID_ARGS: &[&str] = &["on_hotplug", "on_rescue"];

/// Device manager configuration options
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Re-check streams when a new device becomes available
    pub on_hotplug: bool,

    /// Re-check streams when a device becomes unavailable
    pub on_rescue: bool,

    /// Initial state of role-based routing (toggled at runtime by clients)
    pub role_device_priority_routing: bool,

    /// Debounce interval for database flushes
    pub save_interval: Duration,

    /// Location of the database file
    pub database_path: PathBuf,

    /// Module index stamped on change notifications
    pub module_index: u32,

    /// Module name stamped on change notifications
    pub module_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            on_hotplug: true,
            on_rescue: true,
            role_device_priority_routing: false,
            save_interval: DEFAULT_SAVE_INTERVAL,
            database_path: default_database_path(),
            module_index: 0,
            module_name: "module-device-manager".to_string(),
        }
    }
}

/// `<state dir>/device-manager`, falling back to the local data directory
/// and finally the working directory
pub fn default_database_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("pulse"))
        .unwrap_or_default()
        .join(DATABASE_NAME)
}

/// Parse a boolean module argument
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "t" | "true" | "on" => Some(true),
        "0" | "n" | "no" | "f" | "false" | "off" => Some(false),
        _ => None,
    }
}

impl ManagerConfig {
    /// Build a configuration from a module argument string such as
    /// `"on_hotplug=no on_rescue=1"`
    pub fn from_args(args: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for arg in args.split_whitespace() {
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| ConfigError::Malformed(arg.to_string()))?;

            if !VALID_ARGS.contains(&key) {
                return Err(ConfigError::UnknownArgument(key.to_string()));
            }

            let value = parse_boolean(value).ok_or_else(|| ConfigError::InvalidBoolean {
                key: key.to_string(),
                value: value.to_string(),
            })?;

            match key {
                "on_hotplug" => config.on_hotplug = value,
                _ => config.on_rescue = value,
            }
        }

        Ok(config)
    }

    pub fn on_hotplug(mut self, enabled: bool) -> Self {
        self.on_hotplug = enabled;
        self
    }

    pub fn on_rescue(mut self, enabled: bool) -> Self {
        self.on_rescue = enabled;
        self
    }

    /// Set the initial role-based routing state
    pub fn role_device_priority_routing(mut self, enabled: bool) -> Self {
        self.role_device_priority_routing = enabled;
        self
    }

    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the module identity used in change notifications
    pub fn module(mut self, index: u32, name: impl Into<String>) -> Self {
        self.module_index = index;
        self.module_name = name.into();
        self
    }
}
