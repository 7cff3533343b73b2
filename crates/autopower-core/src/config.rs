//! AutoPower configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AutoPowerError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoPowerConfig {
    #[serde(default)]
    pub settings: AppSettings,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl AutoPowerConfig {
    /// Load config from the default path (~/.autopower/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AutoPowerError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AutoPowerError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AutoPowerError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the AutoPower home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".autopower")
    }

    /// Scheduler config with the notification preference folded in.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            show_notifications: self.settings.show_notifications,
            ..self.scheduler.clone()
        }
    }
}

/// Preferences persisted for the desktop shell. The manager never reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub start_minimized: bool,
    #[serde(default = "bool_true")]
    pub show_notifications: bool,
}

fn bool_true() -> bool { true }

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_start: false,
            start_minimized: false,
            show_notifications: true,
        }
    }
}

/// Injected into the scheduling manager at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Emit a single "no tasks" row when nothing is registered.
    #[serde(default = "bool_true")]
    pub empty_placeholder: bool,
    /// Warning shown by the OS before a timed shutdown. `{time}` is replaced.
    #[serde(default = "default_shutdown_message")]
    pub shutdown_message: String,
    #[serde(default = "bool_true")]
    pub show_notifications: bool,
}

fn default_shutdown_message() -> String { "AutoPower: this machine will power off at {time}".into() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            empty_placeholder: true,
            shutdown_message: default_shutdown_message(),
            show_notifications: true,
        }
    }
}

/// Which task store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Windows Task Scheduler via schtasks.exe.
    Schtasks,
    /// JSON file; nothing fires, useful for previews and non-Windows hosts.
    File,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(windows) { Backend::Schtasks } else { Backend::File }
    }
}

impl std::str::FromStr for Backend {
    type Err = AutoPowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "schtasks" => Ok(Backend::Schtasks),
            "file" => Ok(Backend::File),
            other => Err(AutoPowerError::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// OS adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_task_folder")]
    pub task_folder: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Ledger and file-store directory; defaults to ~/.autopower.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_task_folder() -> String { "AutoPower".into() }
fn default_command_timeout() -> u64 { 30 }

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            task_folder: default_task_folder(),
            command_timeout_secs: default_command_timeout(),
            data_dir: None,
        }
    }
}

impl PlatformConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(AutoPowerConfig::home_dir)
    }
}
