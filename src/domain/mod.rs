//! Domain models for the dependency engine
//!
//! Contains the graph and constraint logic without any I/O concerns.

mod id;
mod dependency;
mod task;
mod calendar;
mod graph;
mod evaluate;
mod policy;
mod resolve;

pub use id::{DependencyId, IdError, ProjectId, TaskId};
pub use dependency::{Dependency, DependencyPatch, DependencyType, NewDependency, TaskDependencies};
pub use task::Task;
pub use calendar::{CalendarDays, WeekdayCalendar, WorkingCalendar};
pub use graph::{DependencyGraph, GraphError};
pub use evaluate::{evaluate, evaluate_with, required_bound, Severity, Violation};
pub use policy::DependencyPolicy;
pub use resolve::{
    enforce, EnforceOptions, EnforcementReport, ResolutionPolicy, ResolveError, ScheduleDelta,
    ShiftResolver, ViolationResolver,
};
