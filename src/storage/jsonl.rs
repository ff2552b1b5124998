//! JSONL storage for dependencies
//!
//! Each project's edges live in `.ganttdeps/dependencies/{project}.jsonl`
//! with one JSON object per line, in commit order.
//! Uses file locking for concurrent access safety.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::store::{DependencyStore, StoreError};
use crate::domain::{Dependency, ProjectId};

const EXTENSION: &str = "jsonl";

/// Store for dependency edge sets in JSONL format
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    /// Creates a new store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the default store for a workspace
    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(".ganttdeps").join("dependencies"))
    }

    /// Returns the directory holding the project files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing a project
    pub fn path_for(&self, project: &ProjectId) -> PathBuf {
        self.dir.join(format!("{}.{}", project, EXTENSION))
    }

    fn read_file(path: &Path) -> Result<Vec<Dependency>, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // Acquire shared lock for reading
        file.lock_shared()?;

        let reader = BufReader::new(&file);
        let mut edges = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            let edge: Dependency =
                serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    line: line_num + 1,
                    message: e.to_string(),
                })?;

            edges.push(edge);
        }

        // Lock is released when file is dropped
        Ok(edges)
    }

    fn write_file(&self, path: &Path, edges: &[Dependency]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        // Write to temp file first
        let temp_path = path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;

            // Acquire exclusive lock
            file.lock_exclusive()?;

            let mut writer = BufWriter::new(&file);
            for edge in edges {
                let line = serde_json::to_string(edge)?;
                writeln!(writer, "{}", line)?;
            }

            writer.flush()?;
            file.sync_all()?;
        }

        // Atomic rename
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}

impl DependencyStore for JsonlStore {
    fn get(&self, project: &ProjectId) -> Result<Vec<Dependency>, StoreError> {
        Self::read_file(&self.path_for(project))
    }

    fn set(&self, project: &ProjectId, edges: &[Dependency]) -> Result<(), StoreError> {
        let path = self.path_for(project);

        if edges.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        self.write_file(&path, edges)
    }

    fn projects(&self) -> Result<Vec<ProjectId>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut projects = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            // Skip files whose name is not a valid project ID
            if let Some(project) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<ProjectId>().ok())
            {
                projects.push(project);
            }
        }

        projects.sort();
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyId, DependencyType, TaskId};
    use chrono::Utc;
    use tempfile::TempDir;

    fn make_edge(project: &ProjectId, source: &str, target: &str) -> Dependency {
        let (s, t): (TaskId, TaskId) = (source.parse().unwrap(), target.parse().unwrap());
        let now = Utc::now();
        Dependency {
            id: DependencyId::generate(project, &s, &t, now),
            project_id: project.clone(),
            source_task_id: s,
            target_task_id: t,
            dep_type: DependencyType::StartToStart,
            lag: -1,
            created_at: now,
            updated_at: now,
        }
    }

    fn project(name: &str) -> ProjectId {
        name.parse().unwrap()
    }

    #[test]
    fn read_missing_project() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("deps"));

        assert!(store.get(&project("p1")).unwrap().is_empty());
        assert!(store.projects().unwrap().is_empty());
    }

    #[test]
    fn write_and_read_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("deps"));
        let p = project("p1");

        let edges = vec![make_edge(&p, "z", "y"), make_edge(&p, "a", "b")];
        store.set(&p, &edges).unwrap();

        assert_eq!(store.get(&p).unwrap(), edges);
        assert_eq!(store.projects().unwrap(), vec![p]);
    }

    #[test]
    fn projects_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path());

        let (p1, p2) = (project("p1"), project("p2"));
        store.set(&p1, &[make_edge(&p1, "a", "b")]).unwrap();
        store.set(&p2, &[make_edge(&p2, "c", "d")]).unwrap();

        assert_eq!(store.get(&p1).unwrap().len(), 1);
        assert_eq!(store.get(&p2).unwrap()[0].source_task_id.as_str(), "c");
        assert_eq!(store.projects().unwrap(), vec![p1, p2]);
    }

    #[test]
    fn empty_set_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path());
        let p = project("p1");

        store.set(&p, &[make_edge(&p, "a", "b")]).unwrap();
        assert!(store.path_for(&p).exists());

        store.set(&p, &[]).unwrap();
        assert!(!store.path_for(&p).exists());

        // Clearing twice is fine
        store.set(&p, &[]).unwrap();
    }

    #[test]
    fn corrupt_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path());
        let p = project("p1");

        store.set(&p, &[make_edge(&p, "a", "b")]).unwrap();
        let path = store.path_for(&p);
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("\n{not json}\n");
        fs::write(&path, content).unwrap();

        match store.get(&p) {
            Err(StoreError::Corrupt { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn atomic_write() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path());
        let p = project("p1");

        store.set(&p, &[make_edge(&p, "a", "b")]).unwrap();

        // Temp file should not exist after write
        let temp_path = store.path_for(&p).with_extension("jsonl.tmp");
        assert!(!temp_path.exists());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("nested").join("dir"));
        let p = project("p1");

        store.set(&p, &[make_edge(&p, "a", "b")]).unwrap();
        assert!(store.path_for(&p).exists());
    }
}
