//! Daemon configuration.
//!
//! Settings are read from `~/.adhan/config.json`. Every field is optional in
//! the file; a missing file yields the defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory under the home directory holding all daemon state.
pub const APP_DIR_NAME: &str = ".adhan";

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    home_dir().join(APP_DIR_NAME)
}

fn default_socket_path() -> PathBuf {
    default_data_dir().join("adhan.sock")
}

fn default_preferences_path() -> PathBuf {
    default_data_dir().join("preferences.json")
}

fn default_sounds_dir() -> PathBuf {
    default_data_dir().join("sounds")
}

fn default_exact_alarms_allowed() -> bool {
    true
}

fn default_alarm_volume_level() -> u32 {
    5
}

fn default_alarm_volume_max() -> u32 {
    7
}

fn default_wake_lock_timeout_secs() -> u64 {
    60
}

/// Runtime configuration of the daemon and the CLI client.
///
/// # Example
///
/// ```
/// use adhan::config::DaemonConfig;
///
/// let config = DaemonConfig::default();
/// assert_eq!(config.wake_lock_timeout_secs, 60);
/// assert!(config.exact_alarms_allowed);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Directory for durable daemon state (reschedule flag, logs).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSON preference store written by the owning application.
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,

    /// Directory holding `<sound>.<ext>` recordings.
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,

    /// Whether precise timers are permitted.
    #[serde(default = "default_exact_alarms_allowed")]
    pub exact_alarms_allowed: bool,

    /// Initial alarm channel step.
    #[serde(default = "default_alarm_volume_level")]
    pub alarm_volume_level: u32,

    /// Number of alarm channel steps.
    #[serde(default = "default_alarm_volume_max")]
    pub alarm_volume_max: u32,

    /// Upper bound of a single dispatcher activation.
    #[serde(default = "default_wake_lock_timeout_secs")]
    pub wake_lock_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            data_dir: default_data_dir(),
            preferences_path: default_preferences_path(),
            sounds_dir: default_sounds_dir(),
            exact_alarms_allowed: default_exact_alarms_allowed(),
            alarm_volume_level: default_alarm_volume_level(),
            alarm_volume_max: default_alarm_volume_max(),
            wake_lock_timeout_secs: default_wake_lock_timeout_secs(),
        }
    }
}

impl DaemonConfig {
    /// Returns the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        default_data_dir().join(CONFIG_FILE_NAME)
    }

    /// Creates a configuration with every path rooted at `dir`.
    #[must_use]
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            socket_path: dir.join("adhan.sock"),
            preferences_path: dir.join("preferences.json"),
            sounds_dir: dir.join("sounds"),
            data_dir: dir,
            ..Self::default()
        }
    }

    /// Loads the configuration from `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Loads the configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`DaemonConfig::load`].
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a descriptive message for the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.alarm_volume_level > self.alarm_volume_max {
            return Err(format!(
                "alarm_volume_level ({}) must not exceed alarm_volume_max ({})",
                self.alarm_volume_level, self.alarm_volume_max
            ));
        }
        if self.wake_lock_timeout_secs == 0 || self.wake_lock_timeout_secs > 600 {
            return Err(format!(
                "wake_lock_timeout_secs must be between 1 and 600, got {}",
                self.wake_lock_timeout_secs
            ));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err("socket_path must not be empty".to_string());
        }
        Ok(())
    }

    /// Path of the durable pending-reschedule flag.
    #[must_use]
    pub fn reschedule_flag_path(&self) -> PathBuf {
        self.data_dir.join(crate::daemon::RESCHEDULE_FLAG_FILE)
    }

    /// Directory for the LaunchAgent's stdout/stderr logs.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
