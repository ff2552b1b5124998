//! ganttdeps - precedence constraints between scheduled tasks
//!
//! Stores typed dependencies (FS, SS, FF, SF with lag) per project, keeps
//! each project's edge set acyclic, and checks concrete schedules against
//! it. Resolution of violations is left to pluggable resolvers.

pub mod domain;
pub mod storage;
pub mod cli;
pub mod logging;

pub use domain::{
    evaluate, Dependency, DependencyId, DependencyPolicy, DependencyType, ProjectId,
    ResolutionPolicy, Task, TaskId, Violation, ViolationResolver,
};
pub use storage::{DependencyError, DependencyRepository};
