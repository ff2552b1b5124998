//! # Storage Layer
//!
//! Persistence and the repository that guards it.
//!
//! ## Storage Backends
//!
//! | Backend | Format | Location |
//! |---------|--------|----------|
//! | [`JsonlStore`] | JSONL (one dependency per line) | `.ganttdeps/dependencies/{project}.jsonl` |
//! | [`SqliteStore`] | SQLite table | `.ganttdeps/dependencies.db` |
//! | [`MemoryStore`] | in-process map | none |
//! | Config | TOML | `.ganttdeps/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`DependencyRepository`] serializes mutations per project and publishes
//!   immutable snapshots to readers
//! - [`JsonlStore`] uses file locking (`fs2`) and atomic writes (temp file + rename)
//! - [`SqliteStore`] replaces a project's rows in one transaction
//!
//! ## Workspace Structure
//!
//! ```text
//! .ganttdeps/
//! ├── dependencies/
//! │   └── tower-a.jsonl     # One edge set per project
//! ├── dependencies.db       # SQLite backend (if selected)
//! ├── config.toml           # Workspace configuration
//! └── .gitignore            # Ignores SQLite files
//! ```

mod store;
mod jsonl;
mod sqlite;
mod repository;
mod config;
mod workspace;

pub use store::{DependencyStore, MemoryStore, StoreError};
pub use jsonl::JsonlStore;
pub use sqlite::SqliteStore;
pub use repository::{DependencyError, DependencyRepository, ProjectSnapshot};
pub use config::{
    CalendarConfig, CalendarKind, Config, ConfigError, DefaultFormat, GlobalConfig, StorageBackend,
    StorageConfig, WorkspaceConfig,
};
pub use workspace::{Workspace, WorkspaceError};
