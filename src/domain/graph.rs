//! Dependency graph for a single project
//!
//! Successor adjacency over the committed edge set, rebuilt once per
//! committed mutation, used to decide whether a candidate edge would close a
//! cycle. Uses petgraph for storage and topological ordering.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

use super::dependency::Dependency;
use super::id::{DependencyId, TaskId};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency graph contains a cycle through task {0}")]
    Cyclic(TaskId),
}

/// Directed precedence graph: an edge `a -> b` means `a` precedes `b`
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<TaskId, DependencyId>,

    /// Map from TaskId to node index
    node_map: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds the graph from a committed edge set
    ///
    /// No acyclicity check happens here: the edge set was validated edge by
    /// edge when it was committed.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Dependency>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            let source = graph.ensure_node(&edge.source_task_id);
            let target = graph.ensure_node(&edge.target_task_id);
            graph.graph.add_edge(source, target, edge.id.clone());
        }
        graph
    }

    fn ensure_node(&mut self, task_id: &TaskId) -> NodeIndex {
        if let Some(idx) = self.node_map.get(task_id) {
            return *idx;
        }
        let idx = self.graph.add_node(task_id.clone());
        self.node_map.insert(task_id.clone(), idx);
        idx
    }

    /// Returns true if committing `source -> target` would make the graph cyclic
    ///
    /// A self-loop is rejected without traversal. Otherwise a depth-first
    /// search runs from `target` along successor edges; reaching `source`
    /// means the path `target -> .. -> source` exists and the candidate would
    /// close it. A `target` with no edges cannot start a path. An unknown
    /// `source` still gets the traversal, so a cycle already present in
    /// stored data is never extended.
    pub fn would_create_cycle(&self, source: &TaskId, target: &TaskId) -> bool {
        if source == target {
            return true;
        }

        let Some(&start) = self.node_map.get(target) else {
            return false;
        };
        let goal = self.node_map.get(source).copied();

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut recursion_stack: HashSet<NodeIndex> = HashSet::new();

        // Explicit stack of (node, successors not yet explored)
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = Vec::new();

        visited.insert(start);
        recursion_stack.insert(start);
        stack.push((start, self.successor_indices(start)));

        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(next) => {
                    if Some(next) == goal {
                        return true;
                    }
                    if recursion_stack.contains(&next) {
                        // Stored data already holds a cycle; never extend it
                        return true;
                    }
                    if visited.insert(next) {
                        recursion_stack.insert(next);
                        let successors = self.successor_indices(next);
                        stack.push((next, successors));
                    }
                }
                None => {
                    recursion_stack.remove(&node);
                    stack.pop();
                }
            }
        }

        false
    }

    fn successor_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect()
    }

    /// Returns true if a directed path `from -> .. -> to` exists
    pub fn has_path(&self, from: &TaskId, to: &TaskId) -> bool {
        if from == to {
            return false;
        }
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    /// Returns the direct predecessors of a task
    pub fn predecessors(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.neighbors(task_id, Direction::Incoming)
    }

    /// Returns the direct successors of a task
    pub fn successors(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.neighbors(task_id, Direction::Outgoing)
    }

    fn neighbors(&self, task_id: &TaskId, direction: Direction) -> Vec<TaskId> {
        let Some(&idx) = self.node_map.get(task_id) else {
            return vec![];
        };

        self.graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Returns all tasks in topological order (predecessors before successors)
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => Err(GraphError::Cyclic(self.graph[cycle.node_id()].clone())),
        }
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.node_map.contains_key(task_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Returns the number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
