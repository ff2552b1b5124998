//! Dependency domain model
//!
//! A dependency is a directed precedence edge `source -> target` between two
//! tasks of the same project, qualified by a relationship type and a lag in
//! working days.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{DependencyId, ProjectId, TaskId};

/// Precedence relationship between a source and a target task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DependencyType {
    /// Target cannot start before source finishes
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
    /// Target cannot start before source starts
    #[serde(rename = "SS")]
    StartToStart,
    /// Target cannot finish before source finishes
    #[serde(rename = "FF")]
    FinishToFinish,
    /// Target cannot finish before source starts
    #[serde(rename = "SF")]
    StartToFinish,
}

impl DependencyType {
    pub const ALL: [DependencyType; 4] = [
        DependencyType::FinishToStart,
        DependencyType::StartToStart,
        DependencyType::FinishToFinish,
        DependencyType::StartToFinish,
    ];

    /// Returns the two-letter code (`FS`, `SS`, `FF`, `SF`)
    pub fn code(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }

    /// True if the bound is measured from the source's start (SS, SF)
    pub fn from_source_start(&self) -> bool {
        matches!(
            self,
            DependencyType::StartToStart | DependencyType::StartToFinish
        )
    }

    /// True if the bound constrains the target's start (FS, SS)
    pub fn constrains_target_start(&self) -> bool {
        matches!(
            self,
            DependencyType::FinishToStart | DependencyType::StartToStart
        )
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fs" | "finish-to-start" => Ok(DependencyType::FinishToStart),
            "ss" | "start-to-start" => Ok(DependencyType::StartToStart),
            "ff" | "finish-to-finish" => Ok(DependencyType::FinishToFinish),
            "sf" | "start-to-finish" => Ok(DependencyType::StartToFinish),
            other => Err(format!(
                "unknown dependency type '{}': expected FS, SS, FF or SF",
                other
            )),
        }
    }
}

/// A committed precedence edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,

    pub project_id: ProjectId,

    /// Predecessor
    pub source_task_id: TaskId,

    /// Successor
    pub target_task_id: TaskId,

    #[serde(rename = "type", default)]
    pub dep_type: DependencyType,

    /// Whole working days; negative values are leads
    #[serde(default)]
    pub lag: i32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Dependency {
    /// Returns true if this edge connects `source -> target`
    pub fn connects(&self, source: &TaskId, target: &TaskId) -> bool {
        &self.source_task_id == source && &self.target_task_id == target
    }

    /// Returns true if `task` is either endpoint
    pub fn touches(&self, task: &TaskId) -> bool {
        &self.source_task_id == task || &self.target_task_id == task
    }
}

/// Input to `DependencyRepository::create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDependency {
    pub project_id: ProjectId,
    pub source_task_id: TaskId,
    pub target_task_id: TaskId,
    #[serde(rename = "type", default)]
    pub dep_type: Option<DependencyType>,
    #[serde(default)]
    pub lag: Option<i32>,
}

impl NewDependency {
    /// Creates a finish-to-start edge with no lag
    pub fn new(project_id: ProjectId, source_task_id: TaskId, target_task_id: TaskId) -> Self {
        Self {
            project_id,
            source_task_id,
            target_task_id,
            dep_type: None,
            lag: None,
        }
    }

    pub fn with_type(mut self, dep_type: DependencyType) -> Self {
        self.dep_type = Some(dep_type);
        self
    }

    pub fn with_lag(mut self, lag: i32) -> Self {
        self.lag = Some(lag);
        self
    }
}

/// Mutable fields of a committed dependency
///
/// Endpoints are deliberately absent: moving an edge is delete + create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyPatch {
    #[serde(rename = "type", default)]
    pub dep_type: Option<DependencyType>,
    #[serde(default)]
    pub lag: Option<i32>,
}

impl DependencyPatch {
    /// Returns true if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.dep_type.is_none() && self.lag.is_none()
    }
}

/// Edges touching a single task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskDependencies {
    /// Edges whose target is the task
    pub predecessors: Vec<Dependency>,
    /// Edges whose source is the task
    pub successors: Vec<Dependency>,
}
