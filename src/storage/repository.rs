//! Dependency repository
//!
//! Authoritative owner of each project's precedence edges. Every mutation of
//! a project runs under that project's writer lock: checks, persistence and
//! the in-memory commit happen as one step. Readers get the last committed
//! snapshot and never wait for a writer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use super::store::{DependencyStore, StoreError};
use crate::domain::{
    Dependency, DependencyGraph, DependencyId, DependencyPatch, DependencyPolicy, DependencyType,
    NewDependency, ProjectId, TaskDependencies, TaskId,
};

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Dependency {source_task} -> {target_task} already exists in project {project}")]
    DuplicateEdge {
        project: ProjectId,
        source_task: TaskId,
        target_task: TaskId,
    },

    #[error("Task cannot depend on itself: {0}")]
    SelfDependency(TaskId),

    #[error("Adding dependency would create a cycle: {source_task} -> {target_task}")]
    CycleDetected {
        source_task: TaskId,
        target_task: TaskId,
    },

    #[error("Dependency not found: {0}")]
    NotFound(DependencyId),

    #[error("Dependency type {0} is not allowed by policy")]
    TypeNotAllowed(DependencyType),

    #[error("Project {project} already holds the maximum of {limit} dependencies")]
    QuotaExceeded { project: ProjectId, limit: usize },

    #[error("Failed to persist dependencies")]
    PersistenceFailed(#[source] StoreError),

    #[error("Failed to load dependencies")]
    LoadFailed(#[source] StoreError),
}

impl DependencyError {
    /// Stable machine-readable code for each error kind
    pub fn code(&self) -> &'static str {
        match self {
            DependencyError::DuplicateEdge { .. } => "duplicate_edge",
            DependencyError::SelfDependency(_) => "self_dependency",
            DependencyError::CycleDetected { .. } => "cycle_detected",
            DependencyError::NotFound(_) => "not_found",
            DependencyError::TypeNotAllowed(_) => "type_not_allowed",
            DependencyError::QuotaExceeded { .. } => "quota_exceeded",
            DependencyError::PersistenceFailed(_) => "persistence_failed",
            DependencyError::LoadFailed(_) => "load_failed",
        }
    }
}

/// Committed state of one project
#[derive(Debug, Default)]
pub struct ProjectSnapshot {
    edges: Vec<Dependency>,
    graph: DependencyGraph,
}

impl ProjectSnapshot {
    fn new(edges: Vec<Dependency>) -> Self {
        let graph = DependencyGraph::from_edges(&edges);
        Self { edges, graph }
    }

    /// Edges in commit order
    pub fn edges(&self) -> &[Dependency] {
        &self.edges
    }

    /// Successor adjacency over the edges
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn find(&self, id: &DependencyId) -> Option<usize> {
        self.edges.iter().position(|e| &e.id == id)
    }
}

/// Per-project writer lock plus the committed snapshot
#[derive(Default)]
struct ProjectSlot {
    writer: Mutex<()>,
    snapshot: RwLock<Option<Arc<ProjectSnapshot>>>,
}

/// Validated CRUD over precedence edges, backed by a [`DependencyStore`]
pub struct DependencyRepository {
    store: Arc<dyn DependencyStore>,
    slots: RwLock<HashMap<ProjectId, Arc<ProjectSlot>>>,
    /// Which project each loaded dependency belongs to
    index: RwLock<HashMap<DependencyId, ProjectId>>,
}

impl DependencyRepository {
    pub fn new(store: Arc<dyn DependencyStore>) -> Self {
        Self {
            store,
            slots: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, project: &ProjectId) -> Arc<ProjectSlot> {
        if let Some(slot) = self.slots.read().get(project) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(project.clone()).or_default())
    }

    /// Returns the committed snapshot, loading it from the store on first use
    fn load(
        &self,
        project: &ProjectId,
        slot: &ProjectSlot,
    ) -> Result<Arc<ProjectSnapshot>, DependencyError> {
        if let Some(snapshot) = slot.snapshot.read().as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let mut guard = slot.snapshot.write();
        if let Some(snapshot) = guard.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let edges = self.store.get(project).map_err(DependencyError::LoadFailed)?;
        tracing::debug!(project = %project, edges = edges.len(), "loaded dependencies");

        let snapshot = Arc::new(ProjectSnapshot::new(edges));
        if let Err(e) = snapshot.graph.topological_order() {
            tracing::warn!(project = %project, error = %e, "stored dependencies are cyclic");
        }

        self.reindex(project, None, &snapshot);
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Persists `edges` and, once the store acknowledges, publishes them
    fn commit(
        &self,
        project: &ProjectId,
        slot: &ProjectSlot,
        previous: &ProjectSnapshot,
        edges: Vec<Dependency>,
    ) -> Result<Arc<ProjectSnapshot>, DependencyError> {
        if let Err(e) = self.store.set(project, &edges) {
            tracing::warn!(project = %project, error = %e, "persisting dependencies failed");
            return Err(DependencyError::PersistenceFailed(e));
        }

        let snapshot = Arc::new(ProjectSnapshot::new(edges));
        // Readers see the index and the snapshot change together
        let mut guard = slot.snapshot.write();
        self.reindex(project, Some(previous), &snapshot);
        *guard = Some(Arc::clone(&snapshot));
        drop(guard);
        tracing::debug!(project = %project, edges = snapshot.edges.len(), "committed dependencies");
        Ok(snapshot)
    }

    fn reindex(
        &self,
        project: &ProjectId,
        previous: Option<&ProjectSnapshot>,
        next: &ProjectSnapshot,
    ) {
        let mut index = self.index.write();
        if let Some(previous) = previous {
            for edge in &previous.edges {
                index.remove(&edge.id);
            }
        }
        for edge in &next.edges {
            index.insert(edge.id.clone(), project.clone());
        }
    }

    /// Finds the project owning `id`, loading every stored project if needed
    fn locate(&self, id: &DependencyId) -> Result<ProjectId, DependencyError> {
        if let Some(project) = self.index.read().get(id) {
            return Ok(project.clone());
        }

        let projects = self.store.projects().map_err(DependencyError::LoadFailed)?;
        for project in projects {
            let slot = self.slot(&project);
            self.load(&project, &slot)?;
        }

        self.index
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DependencyError::NotFound(id.clone()))
    }

    /// Returns a consistent snapshot of a project's edges and graph
    pub fn snapshot(&self, project: &ProjectId) -> Result<Arc<ProjectSnapshot>, DependencyError> {
        let slot = self.slot(project);
        self.load(project, &slot)
    }

    /// Drops the cached snapshot so the next read goes to the store
    pub fn reload(&self, project: &ProjectId) {
        let slot = self.slot(project);
        let _writer = slot.writer.lock();
        let mut guard = slot.snapshot.write();
        if let Some(previous) = guard.take() {
            let mut index = self.index.write();
            for edge in &previous.edges {
                index.remove(&edge.id);
            }
        }
    }

    /// Lists a project's dependencies in commit order
    pub fn list_by_project(&self, project: &ProjectId) -> Result<Vec<Dependency>, DependencyError> {
        Ok(self.snapshot(project)?.edges.clone())
    }

    /// Lists the edges entering (predecessors) and leaving (successors) a task
    pub fn list_by_task(
        &self,
        project: &ProjectId,
        task: &TaskId,
    ) -> Result<TaskDependencies, DependencyError> {
        let snapshot = self.snapshot(project)?;
        let mut result = TaskDependencies::default();
        for edge in snapshot.edges.iter().filter(|e| e.touches(task)) {
            if &edge.target_task_id == task {
                result.predecessors.push(edge.clone());
            }
            if &edge.source_task_id == task {
                result.successors.push(edge.clone());
            }
        }
        Ok(result)
    }

    /// Looks up a single dependency
    pub fn get(&self, id: &DependencyId) -> Result<Dependency, DependencyError> {
        let project = self.locate(id)?;
        let snapshot = self.snapshot(&project)?;
        snapshot
            .find(id)
            .map(|i| snapshot.edges[i].clone())
            .ok_or_else(|| DependencyError::NotFound(id.clone()))
    }

    /// Returns the project's tasks ordered predecessors-first
    pub fn topological_order(&self, project: &ProjectId) -> Result<Vec<TaskId>, DependencyError> {
        let snapshot = self.snapshot(project)?;
        // Committed edge sets are acyclic; a cyclic one can only come from
        // hand-edited storage and yields no order at all.
        Ok(snapshot.graph.topological_order().unwrap_or_default())
    }

    /// Creates a dependency after duplicate, policy and cycle checks
    pub fn create(
        &self,
        new: NewDependency,
        policy: &DependencyPolicy,
    ) -> Result<Dependency, DependencyError> {
        let NewDependency {
            project_id,
            source_task_id,
            target_task_id,
            dep_type,
            lag,
        } = new;

        if source_task_id == target_task_id {
            tracing::debug!(project = %project_id, task = %source_task_id, "rejected self-dependency");
            return Err(DependencyError::SelfDependency(source_task_id));
        }

        let dep_type = dep_type.unwrap_or_default();
        if !policy.allows_type(dep_type) {
            return Err(DependencyError::TypeNotAllowed(dep_type));
        }

        let slot = self.slot(&project_id);
        let _writer = slot.writer.lock();
        let current = self.load(&project_id, &slot)?;

        if current
            .edges
            .iter()
            .any(|e| e.connects(&source_task_id, &target_task_id))
        {
            return Err(DependencyError::DuplicateEdge {
                project: project_id,
                source_task: source_task_id,
                target_task: target_task_id,
            });
        }

        if !policy.allows_another_edge(current.edges.len()) {
            return Err(DependencyError::QuotaExceeded {
                project: project_id,
                limit: policy.max_edges_per_project.unwrap_or_default(),
            });
        }

        if current.graph.would_create_cycle(&source_task_id, &target_task_id) {
            tracing::debug!(
                project = %project_id,
                source = %source_task_id,
                target = %target_task_id,
                "rejected cyclic dependency"
            );
            return Err(DependencyError::CycleDetected {
                source_task: source_task_id,
                target_task: target_task_id,
            });
        }

        let now = Utc::now();
        let dependency = Dependency {
            id: DependencyId::generate(&project_id, &source_task_id, &target_task_id, now),
            project_id: project_id.clone(),
            source_task_id,
            target_task_id,
            dep_type,
            lag: lag.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };

        let mut edges = current.edges.clone();
        edges.push(dependency.clone());
        self.commit(&project_id, &slot, &current, edges)?;

        tracing::info!(
            id = %dependency.id,
            project = %project_id,
            source = %dependency.source_task_id,
            target = %dependency.target_task_id,
            dep_type = %dependency.dep_type,
            lag = dependency.lag,
            "created dependency"
        );
        Ok(dependency)
    }

    /// Changes the type and/or lag of an existing dependency
    pub fn update(
        &self,
        id: &DependencyId,
        patch: DependencyPatch,
        policy: &DependencyPolicy,
    ) -> Result<Dependency, DependencyError> {
        if let Some(dep_type) = patch.dep_type {
            if !policy.allows_type(dep_type) {
                return Err(DependencyError::TypeNotAllowed(dep_type));
            }
        }

        let project = self.locate(id)?;
        let slot = self.slot(&project);
        let _writer = slot.writer.lock();
        let current = self.load(&project, &slot)?;

        let index = current
            .find(id)
            .ok_or_else(|| DependencyError::NotFound(id.clone()))?;

        let mut edges = current.edges.clone();
        let edge = &mut edges[index];
        if let Some(dep_type) = patch.dep_type {
            edge.dep_type = dep_type;
        }
        if let Some(lag) = patch.lag {
            edge.lag = lag;
        }
        edge.updated_at = Utc::now();
        let updated = edge.clone();

        self.commit(&project, &slot, &current, edges)?;

        tracing::info!(
            id = %id,
            project = %project,
            dep_type = %updated.dep_type,
            lag = updated.lag,
            "updated dependency"
        );
        Ok(updated)
    }

    /// Removes a dependency; removal never needs a cycle check
    pub fn delete(&self, id: &DependencyId) -> Result<(), DependencyError> {
        let project = self.locate(id)?;
        let slot = self.slot(&project);
        let _writer = slot.writer.lock();
        let current = self.load(&project, &slot)?;

        let index = current
            .find(id)
            .ok_or_else(|| DependencyError::NotFound(id.clone()))?;

        let mut edges = current.edges.clone();
        edges.remove(index);
        self.commit(&project, &slot, &current, edges)?;

        tracing::info!(id = %id, project = %project, "deleted dependency");
        Ok(())
    }

    /// Removes every dependency of a project; returns how many were removed
    pub fn clear_project(&self, project: &ProjectId) -> Result<usize, DependencyError> {
        let slot = self.slot(project);
        let _writer = slot.writer.lock();
        let current = self.load(project, &slot)?;

        let removed = current.edges.len();
        self.commit(project, &slot, &current, Vec::new())?;

        tracing::info!(project = %project, removed, "cleared project dependencies");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    /// Store whose writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: std::sync::atomic::AtomicBool,
    }

    impl DependencyStore for FlakyStore {
        fn get(&self, project: &ProjectId) -> Result<Vec<Dependency>, StoreError> {
            self.inner.get(project)
        }

        fn set(&self, project: &ProjectId, edges: &[Dependency]) -> Result<(), StoreError> {
            if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(project, edges)
        }

        fn projects(&self) -> Result<Vec<ProjectId>, StoreError> {
            self.inner.projects()
        }
    }

    fn project() -> ProjectId {
        "site".parse().unwrap()
    }

    fn task(name: &str) -> TaskId {
        name.parse().unwrap()
    }

    fn new_edge(source: &str, target: &str) -> NewDependency {
        NewDependency::new(project(), task(source), task(target))
    }

    fn repo() -> DependencyRepository {
        DependencyRepository::new(Arc::new(MemoryStore::new()))
    }

    fn open() -> DependencyPolicy {
        DependencyPolicy::unrestricted()
    }

    #[test]
    fn create_applies_defaults() {
        let repo = repo();
        let dep = repo.create(new_edge("a", "b"), &open()).unwrap();

        assert_eq!(dep.dep_type, DependencyType::FinishToStart);
        assert_eq!(dep.lag, 0);
        assert_eq!(dep.created_at, dep.updated_at);
        assert_eq!(repo.list_by_project(&project()).unwrap(), vec![dep]);
    }

    #[test]
    fn create_rejects_self_dependency() {
        let repo = repo();
        let err = repo.create(new_edge("a", "a"), &open()).unwrap_err();
        assert!(matches!(err, DependencyError::SelfDependency(_)));
        assert_eq!(err.code(), "self_dependency");
    }

    #[test]
    fn create_rejects_duplicates() {
        let repo = repo();
        repo.create(new_edge("a", "b"), &open()).unwrap();

        let err = repo
            .create(
                new_edge("a", "b").with_type(DependencyType::StartToStart),
                &open(),
            )
            .unwrap_err();
        assert!(matches!(err, DependencyError::DuplicateEdge { .. }));
    }

    #[test]
    fn create_rejects_cycles_and_leaves_set_unchanged() {
        let repo = repo();
        let ab = repo.create(new_edge("a", "b"), &open()).unwrap();

        let err = repo.create(new_edge("b", "a"), &open()).unwrap_err();
        assert!(matches!(err, DependencyError::CycleDetected { .. }));
        assert_eq!(repo.list_by_project(&project()).unwrap(), vec![ab]);
    }

    #[test]
    fn projects_are_independent_graphs() {
        let repo = repo();
        repo.create(new_edge("a", "b"), &open()).unwrap();

        let other: ProjectId = "other".parse().unwrap();
        let reverse = NewDependency::new(other.clone(), task("b"), task("a"));
        assert!(repo.create(reverse, &open()).is_ok());
        assert_eq!(repo.list_by_project(&other).unwrap().len(), 1);
    }

    #[test]
    fn policy_limits() {
        let repo = repo();
        let policy = DependencyPolicy::default()
            .with_max_edges(1)
            .with_allowed_types([DependencyType::FinishToStart]);

        let err = repo
            .create(
                new_edge("a", "b").with_type(DependencyType::StartToFinish),
                &policy,
            )
            .unwrap_err();
        assert!(matches!(err, DependencyError::TypeNotAllowed(DependencyType::StartToFinish)));

        repo.create(new_edge("a", "b"), &policy).unwrap();
        let err = repo.create(new_edge("b", "c"), &policy).unwrap_err();
        assert!(matches!(err, DependencyError::QuotaExceeded { limit: 1, .. }));
    }

    #[test]
    fn list_by_task_splits_directions() {
        let repo = repo();
        let ab = repo.create(new_edge("a", "b"), &open()).unwrap();
        let bc = repo.create(new_edge("b", "c"), &open()).unwrap();

        let deps = repo.list_by_task(&project(), &task("b")).unwrap();
        assert_eq!(deps.predecessors, vec![ab]);
        assert_eq!(deps.successors, vec![bc]);

        let none = repo.list_by_task(&project(), &task("zzz")).unwrap();
        assert!(none.predecessors.is_empty() && none.successors.is_empty());
    }

    #[test]
    fn update_changes_only_type_and_lag() {
        let repo = repo();
        let dep = repo.create(new_edge("a", "b"), &open()).unwrap();

        let patch = DependencyPatch {
            dep_type: Some(DependencyType::StartToStart),
            lag: Some(-2),
        };
        let updated = repo.update(&dep.id, patch, &open()).unwrap();

        assert_eq!(updated.id, dep.id);
        assert_eq!(updated.source_task_id, dep.source_task_id);
        assert_eq!(updated.dep_type, DependencyType::StartToStart);
        assert_eq!(updated.lag, -2);
        assert!(updated.updated_at >= dep.updated_at);
        assert_eq!(repo.get(&dep.id).unwrap(), updated);
    }

    #[test]
    fn update_respects_type_policy() {
        let repo = repo();
        let dep = repo.create(new_edge("a", "b"), &open()).unwrap();
        let policy = DependencyPolicy::default().with_allowed_types([DependencyType::FinishToStart]);

        let patch = DependencyPatch {
            dep_type: Some(DependencyType::FinishToFinish),
            lag: None,
        };
        assert!(matches!(
            repo.update(&dep.id, patch, &policy),
            Err(DependencyError::TypeNotAllowed(_))
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let repo = repo();
        let id: DependencyId = "d-000000000000".parse().unwrap();

        assert!(matches!(
            repo.update(&id, DependencyPatch::default(), &open()),
            Err(DependencyError::NotFound(_))
        ));
        assert!(matches!(repo.delete(&id), Err(DependencyError::NotFound(_))));
        assert!(matches!(repo.get(&id), Err(DependencyError::NotFound(_))));
    }

    #[test]
    fn delete_then_recreate_reverse() {
        let repo = repo();
        let ab = repo.create(new_edge("a", "b"), &open()).unwrap();

        repo.delete(&ab.id).unwrap();
        assert!(repo.list_by_project(&project()).unwrap().is_empty());
        assert!(matches!(repo.delete(&ab.id), Err(DependencyError::NotFound(_))));

        // The cycle guard sees the committed removal
        assert!(repo.create(new_edge("b", "a"), &open()).is_ok());
    }

    #[test]
    fn clear_project_removes_everything() {
        let repo = repo();
        repo.create(new_edge("a", "b"), &open()).unwrap();
        repo.create(new_edge("b", "c"), &open()).unwrap();

        assert_eq!(repo.clear_project(&project()).unwrap(), 2);
        assert!(repo.list_by_project(&project()).unwrap().is_empty());
        assert_eq!(repo.clear_project(&project()).unwrap(), 0);
    }

    #[test]
    fn persistence_failure_rolls_back() {
        let store = Arc::new(FlakyStore::default());
        let repo = DependencyRepository::new(store.clone());
        let ab = repo.create(new_edge("a", "b"), &open()).unwrap();

        store
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let err = repo.create(new_edge("b", "c"), &open()).unwrap_err();
        assert!(matches!(err, DependencyError::PersistenceFailed(_)));
        assert!(matches!(
            repo.delete(&ab.id),
            Err(DependencyError::PersistenceFailed(_))
        ));
        assert_eq!(repo.list_by_project(&project()).unwrap(), vec![ab.clone()]);

        store
            .fail_writes
            .store(false, std::sync::atomic::Ordering::SeqCst);
        repo.create(new_edge("b", "c"), &open()).unwrap();
        assert_eq!(store.get(&project()).unwrap().len(), 2);
    }

    #[test]
    fn locates_ids_of_projects_not_yet_loaded() {
        let store = Arc::new(MemoryStore::new());
        let dep = DependencyRepository::new(store.clone())
            .create(new_edge("a", "b"), &open())
            .unwrap();

        // Fresh repository over the same store
        let repo = DependencyRepository::new(store);
        repo.delete(&dep.id).unwrap();
        assert!(repo.list_by_project(&project()).unwrap().is_empty());
    }

    #[test]
    fn reload_picks_up_external_changes() {
        let store = Arc::new(MemoryStore::new());
        let repo = DependencyRepository::new(store.clone());
        let dep = repo.create(new_edge("a", "b"), &open()).unwrap();

        store.set(&project(), &[]).unwrap();
        assert_eq!(repo.list_by_project(&project()).unwrap().len(), 1);

        repo.reload(&project());
        assert!(repo.list_by_project(&project()).unwrap().is_empty());
        assert!(matches!(repo.get(&dep.id), Err(DependencyError::NotFound(_))));
    }

    #[test]
    fn topological_order_of_project() {
        let repo = repo();
        repo.create(new_edge("b", "c"), &open()).unwrap();
        repo.create(new_edge("a", "b"), &open()).unwrap();

        let order = repo.topological_order(&project()).unwrap();
        assert_eq!(order, vec![task("a"), task("b"), task("c")]);
    }

    #[test]
    fn concurrent_creates_keep_graph_acyclic() {
        let repo = Arc::new(repo());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || {
                    // Half the threads try a -> b, the rest b -> a
                    let (s, t) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                    repo.create(new_edge(s, t), &DependencyPolicy::unrestricted())
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(successes, 1);
        assert_eq!(repo.list_by_project(&project()).unwrap().len(), 1);
    }

    #[test]
    fn indexed_ids_are_always_readable() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let repo = Arc::new(repo());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let repo = Arc::clone(&repo);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let (s, t) = (format!("t{}", i), format!("t{}", i + 1));
                    repo.create(new_edge(&s, &t), &DependencyPolicy::unrestricted())
                        .unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let ids: Vec<DependencyId> = repo.index.read().keys().cloned().collect();
            for id in ids {
                assert!(repo.get(&id).is_ok(), "indexed id {} not readable", id);
            }
        }

        writer.join().unwrap();
        assert_eq!(repo.list_by_project(&project()).unwrap().len(), 200);
    }
}
