//! SQLite storage for dependencies
//!
//! The database sits in `.ganttdeps/dependencies.db` with one row per edge.
//! A project's edge set is replaced inside a single transaction, so readers
//! never observe a half-written set.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{DependencyStore, StoreError};
use crate::domain::{Dependency, DependencyType, ProjectId};

/// SQLite-backed dependency store
pub struct SqliteStore {
    /// Path to the SQLite database (`:memory:` for in-memory stores)
    db_path: PathBuf,

    /// Database connection
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Schema version - bump when schema changes to force migration
    const SCHEMA_VERSION: i32 = 1;

    /// Creates or opens the store at the given path
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;

        Self::with_connection(db_path, conn)
    }

    /// Opens the default store for a workspace
    pub fn for_workspace(workspace_root: &Path) -> Result<Self, StoreError> {
        Self::open(workspace_root.join(".ganttdeps").join("dependencies.db"))
    }

    /// Creates a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(PathBuf::from(":memory:"), Connection::open_in_memory()?)
    }

    fn with_connection(db_path: PathBuf, conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Returns the database path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Ensures the schema is up to date
    fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        let current_version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);

        if current_version == Self::SCHEMA_VERSION {
            return Ok(());
        }

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS dependencies (
                project_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                id TEXT NOT NULL UNIQUE,
                source_task_id TEXT NOT NULL,
                target_task_id TEXT NOT NULL,
                dep_type TEXT NOT NULL,
                lag INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project_id, position),
                UNIQUE (project_id, source_task_id, target_task_id)
            );

            CREATE INDEX IF NOT EXISTS idx_deps_source ON dependencies(project_id, source_task_id);
            CREATE INDEX IF NOT EXISTS idx_deps_target ON dependencies(project_id, target_task_id);
            ",
        )?;

        // Set schema version
        conn.execute_batch(&format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION))?;

        Ok(())
    }

    fn corrupt(&self, position: i64, message: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            path: self.db_path.clone(),
            line: usize::try_from(position).unwrap_or(0) + 1,
            message: message.into(),
        }
    }

    fn parse_time(&self, position: i64, value: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| self.corrupt(position, format!("bad timestamp '{}': {}", value, e)))
    }
}

struct RawRow {
    position: i64,
    id: String,
    source: String,
    target: String,
    dep_type: String,
    lag: i32,
    created_at: String,
    updated_at: String,
}

impl DependencyStore for SqliteStore {
    fn get(&self, project: &ProjectId) -> Result<Vec<Dependency>, StoreError> {
        let rows: Vec<RawRow> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT position, id, source_task_id, target_task_id, dep_type, lag, created_at, updated_at
                 FROM dependencies WHERE project_id = ?1 ORDER BY position",
            )?;
            let rows = stmt
                .query_map(params![project.as_str()], |row| {
                    Ok(RawRow {
                        position: row.get(0)?,
                        id: row.get(1)?,
                        source: row.get(2)?,
                        target: row.get(3)?,
                        dep_type: row.get(4)?,
                        lag: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|row| {
                let pos = row.position;
                Ok(Dependency {
                    id: row.id.parse().map_err(|e| self.corrupt(pos, format!("{}", e)))?,
                    project_id: project.clone(),
                    source_task_id: row
                        .source
                        .parse()
                        .map_err(|e| self.corrupt(pos, format!("{}", e)))?,
                    target_task_id: row
                        .target
                        .parse()
                        .map_err(|e| self.corrupt(pos, format!("{}", e)))?,
                    dep_type: row
                        .dep_type
                        .parse::<DependencyType>()
                        .map_err(|e| self.corrupt(pos, e))?,
                    lag: row.lag,
                    created_at: self.parse_time(pos, &row.created_at)?,
                    updated_at: self.parse_time(pos, &row.updated_at)?,
                })
            })
            .collect()
    }

    fn set(&self, project: &ProjectId, edges: &[Dependency]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM dependencies WHERE project_id = ?1",
            params![project.as_str()],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO dependencies (project_id, position, id, source_task_id, target_task_id, dep_type, lag, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for (position, edge) in edges.iter().enumerate() {
                stmt.execute(params![
                    project.as_str(),
                    position as i64,
                    edge.id.to_string(),
                    edge.source_task_id.as_str(),
                    edge.target_task_id.as_str(),
                    edge.dep_type.code(),
                    edge.lag,
                    edge.created_at.to_rfc3339(),
                    edge.updated_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn projects(&self) -> Result<Vec<ProjectId>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT project_id FROM dependencies ORDER BY project_id")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names.into_iter().filter_map(|n| n.parse().ok()).collect())
    }
}
