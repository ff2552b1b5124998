//! Workspace management
//!
//! Handles workspace initialization and wires the configured store into a
//! repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::{Config, StorageBackend};
use super::{DependencyRepository, DependencyStore, JsonlStore, SqliteStore};
use crate::domain::WorkingCalendar;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Not in a ganttdeps workspace. Run 'ganttdeps init' first.")]
    NotInWorkspace,
}

const DEFAULT_CONFIG: &str = r#"# ganttdeps configuration

# Default log level (error, warn, info, debug, trace)
# log_level = "warn"

[storage]
# "jsonl" (one file per project) or "sqlite"
backend = "jsonl"

[policy]
# max_edges_per_project = 500
# allowed_types = ["FS", "SS", "FF", "SF"]

[calendar]
# "calendar_days" or "weekdays"
kind = "calendar_days"
holidays = []

[enforcement]
# Used by `check --enforce`: "ignore", "push-successor" or "shrink-predecessor"
policy = "ignore"
allow_shrink_predecessor = false
"#;

const GITIGNORE: &str = r#"# SQLite store files (use the jsonl backend to version dependencies)
dependencies.db
dependencies.db-wal
dependencies.db-shm

# Interrupted writes
dependencies/*.tmp
"#;

/// A ganttdeps workspace on disk
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Opens an existing workspace at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".ganttdeps").is_dir() {
            return Err(WorkspaceError::NotInWorkspace.into());
        }

        let config = Config::for_workspace(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the workspace at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_workspace_root().ok_or(WorkspaceError::NotInWorkspace)?;

        Self::open(root)
    }

    /// Initializes a new workspace at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join(".ganttdeps");

        let deps_dir = data_dir.join("dependencies");
        fs::create_dir_all(&deps_dir).with_context(|| {
            format!(
                "Failed to create dependencies directory: {}",
                deps_dir.display()
            )
        })?;

        // Create default config
        let config_path = data_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = data_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        tracing::debug!(root = %root.display(), "initialized workspace");
        Self::open(root)
    }

    /// Returns the workspace root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .ganttdeps directory path
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(".ganttdeps")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the configured store
    pub fn store(&self) -> Result<Arc<dyn DependencyStore>> {
        let store: Arc<dyn DependencyStore> = match self.config.workspace.storage.backend {
            StorageBackend::Jsonl => Arc::new(JsonlStore::for_workspace(&self.root)),
            StorageBackend::Sqlite => Arc::new(
                SqliteStore::for_workspace(&self.root).context("Failed to open SQLite store")?,
            ),
        };
        tracing::debug!(backend = self.config.workspace.storage.backend.as_str(), "opened store");
        Ok(store)
    }

    /// Builds a repository over the configured store
    pub fn repository(&self) -> Result<DependencyRepository> {
        Ok(DependencyRepository::new(self.store()?))
    }

    /// Builds the configured lag calendar
    pub fn calendar(&self) -> Box<dyn WorkingCalendar> {
        self.config.workspace.calendar.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyPolicy, NewDependency};
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();

        assert!(workspace.data_dir().is_dir());
        assert!(workspace.data_dir().join("dependencies").is_dir());
        assert!(workspace.data_dir().join("config.toml").is_file());
        assert!(workspace.data_dir().join(".gitignore").is_file());
    }

    #[test]
    fn default_config_parses() {
        let config: crate::storage::WorkspaceConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Workspace::init(dir.path()).unwrap();
        Workspace::init(dir.path()).unwrap(); // Should not fail

        assert!(dir.path().join(".ganttdeps").is_dir());
    }

    #[test]
    fn open_non_workspace_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Workspace::open(dir.path()).is_err());
    }

    #[test]
    fn repository_persists_through_jsonl() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        let project = "site".parse().unwrap();

        let repo = workspace.repository().unwrap();
        repo.create(
            NewDependency::new(
                "site".parse().unwrap(),
                "a".parse().unwrap(),
                "b".parse().unwrap(),
            ),
            &DependencyPolicy::unrestricted(),
        )
        .unwrap();

        let reopened = Workspace::open(dir.path()).unwrap().repository().unwrap();
        assert_eq!(reopened.list_by_project(&project).unwrap().len(), 1);
        assert!(dir
            .path()
            .join(".ganttdeps/dependencies/site.jsonl")
            .is_file());
    }

    #[test]
    fn sqlite_backend_is_selected_by_config() {
        let dir = TempDir::new().unwrap();
        Workspace::init(dir.path()).unwrap();
        fs::write(
            dir.path().join(".ganttdeps/config.toml"),
            "[storage]\nbackend = \"sqlite\"\n",
        )
        .unwrap();

        let workspace = Workspace::open(dir.path()).unwrap();
        workspace.store().unwrap();
        assert!(dir.path().join(".ganttdeps/dependencies.db").is_file());
    }
}
