//! Configuration handling for ganttdeps
//!
//! Configuration is stored in `.ganttdeps/config.toml` (workspace) and
//! `~/.config/ganttdeps/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    CalendarDays, DependencyPolicy, EnforceOptions, WeekdayCalendar, WorkingCalendar,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Persistence backend for dependency edge sets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One JSONL file per project
    #[default]
    Jsonl,
    /// Single SQLite database
    Sqlite,
}

impl StorageBackend {
    pub fn as_str(&self) -> &str {
        match self {
            StorageBackend::Jsonl => "jsonl",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// How lags are counted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    /// Every day counts
    #[default]
    CalendarDays,
    /// Monday to Friday, minus holidays
    Weekdays,
}

/// Working calendar settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CalendarConfig {
    pub kind: CalendarKind,

    /// Non-working dates (only used by `weekdays`)
    pub holidays: Vec<NaiveDate>,
}

impl CalendarConfig {
    /// Builds the configured calendar
    pub fn build(&self) -> Box<dyn WorkingCalendar> {
        match self.kind {
            CalendarKind::CalendarDays => Box::new(CalendarDays),
            CalendarKind::Weekdays => {
                Box::new(WeekdayCalendar::with_holidays(self.holidays.iter().copied()))
            }
        }
    }
}

/// Workspace-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Log level when neither flags nor environment set one
    pub log_level: Option<String>,

    /// Storage settings
    pub storage: StorageConfig,

    /// Limits applied to every mutation
    pub policy: DependencyPolicy,

    /// Lag calendar
    pub calendar: CalendarConfig,

    /// Settings for enforcement runs
    pub enforcement: EnforceOptions,
}

impl WorkspaceConfig {
    /// Checks settings serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.max_edges_per_project == Some(0) {
            return Err(ConfigError::Invalid(
                "policy.max_edges_per_project must be at least 1".to_string(),
            ));
        }
        if let Some(types) = &self.policy.allowed_types {
            if types.is_empty() {
                return Err(ConfigError::Invalid(
                    "policy.allowed_types must not be empty (omit it to allow all)".to_string(),
                ));
            }
        }
        if let Some(level) = &self.log_level {
            if crate::logging::parse_level_str(level).is_none() {
                return Err(ConfigError::Invalid(format!("unknown log_level '{}'", level)));
            }
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: DefaultFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + workspace)
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub global: GlobalConfig,
    pub workspace_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific workspace
    pub fn for_workspace(workspace_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let workspace = Self::load_workspace_config(workspace_root)?;

        Ok(Self {
            workspace,
            global,
            workspace_root: Some(workspace_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "ganttdeps", "ganttdeps")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads workspace configuration from a specific root
    fn load_workspace_config(workspace_root: &Path) -> Result<WorkspaceConfig> {
        let config_path = workspace_root.join(".ganttdeps").join("config.toml");

        if !config_path.exists() {
            return Ok(WorkspaceConfig::default());
        }

        let content = fs::read_to_string(&config_path).with_context(|| {
            format!("Failed to read workspace config: {}", config_path.display())
        })?;

        let config: WorkspaceConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse workspace config")?;

        config
            .validate()
            .with_context(|| format!("Invalid workspace config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the workspace root by looking for `.ganttdeps/` directory
    pub fn find_workspace_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(".ganttdeps").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the workspace root, or an error if not in a workspace
    pub fn require_workspace_root(&self) -> Result<&Path> {
        self.workspace_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in a ganttdeps workspace. Run 'ganttdeps init' first."))
    }

    /// Saves the workspace configuration
    pub fn save_workspace(&self) -> Result<()> {
        let root = self.require_workspace_root()?;
        let config_path = root.join(".ganttdeps").join("config.toml");

        let content = toml::to_string_pretty(&self.workspace)
            .context("Failed to serialize workspace config")?;

        fs::write(&config_path, content).with_context(|| {
            format!("Failed to write workspace config: {}", config_path.display())
        })
    }
}
