//! Persistence contract for dependency edge sets
//!
//! A store keeps one ordered edge list per project. The repository reads a
//! project's list once and writes the whole list back after every mutation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

use crate::domain::{Dependency, ProjectId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt store {path} at line {line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Durable home of each project's edge set
pub trait DependencyStore: Send + Sync {
    /// Returns the project's edges in commit order (empty if none)
    fn get(&self, project: &ProjectId) -> Result<Vec<Dependency>, StoreError>;

    /// Replaces the project's edges; returns only once they are durable
    fn set(&self, project: &ProjectId, edges: &[Dependency]) -> Result<(), StoreError>;

    /// Lists projects that currently hold at least one edge
    fn projects(&self) -> Result<Vec<ProjectId>, StoreError>;
}

/// In-process store, for tests and embedding without durability
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: Mutex<BTreeMap<ProjectId, Vec<Dependency>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DependencyStore for MemoryStore {
    fn get(&self, project: &ProjectId) -> Result<Vec<Dependency>, StoreError> {
        Ok(self.projects.lock().get(project).cloned().unwrap_or_default())
    }

    fn set(&self, project: &ProjectId, edges: &[Dependency]) -> Result<(), StoreError> {
        let mut projects = self.projects.lock();
        if edges.is_empty() {
            projects.remove(project);
        } else {
            projects.insert(project.clone(), edges.to_vec());
        }
        Ok(())
    }

    fn projects(&self) -> Result<Vec<ProjectId>, StoreError> {
        Ok(self.projects.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyId, DependencyType, TaskId};
    use chrono::Utc;

    fn edge(project: &ProjectId) -> Dependency {
        let (s, t): (TaskId, TaskId) = ("a".parse().unwrap(), "b".parse().unwrap());
        let now = Utc::now();
        Dependency {
            id: DependencyId::generate(project, &s, &t, now),
            project_id: project.clone(),
            source_task_id: s,
            target_task_id: t,
            dep_type: DependencyType::FinishToStart,
            lag: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        let project: ProjectId = "p1".parse().unwrap();

        assert!(store.get(&project).unwrap().is_empty());

        let edges = vec![edge(&project)];
        store.set(&project, &edges).unwrap();

        assert_eq!(store.get(&project).unwrap(), edges);
        assert_eq!(store.projects().unwrap(), vec![project.clone()]);

        store.set(&project, &[]).unwrap();
        assert!(store.projects().unwrap().is_empty());
    }
}
