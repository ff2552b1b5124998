//! Violation resolution hook
//!
//! The engine does not move tasks itself. A host plugs in a
//! [`ViolationResolver`] that proposes [`ScheduleDelta`]s for a violation
//! under a chosen [`ResolutionPolicy`]; [`enforce`] drives evaluate/resolve
//! rounds and stops after at most one round per edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::calendar::WorkingCalendar;
use super::dependency::Dependency;
use super::evaluate::{evaluate_with, required_bound, Violation};
use super::id::TaskId;
use super::task::Task;

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("Resolution policy '{0}' is not allowed")]
    PolicyDisallowed(ResolutionPolicy),

    #[error("Resolver proposed a change to unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Resolver failed: {0}")]
    Resolver(String),
}

/// Strategy a resolver applies to a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// Move the target later until the bound holds
    PushSuccessor,
    /// Pull the source earlier; off unless explicitly allowed
    ShrinkPredecessor,
    /// Record the violation, change nothing
    #[default]
    Ignore,
}

impl ResolutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPolicy::PushSuccessor => "push-successor",
            ResolutionPolicy::ShrinkPredecessor => "shrink-predecessor",
            ResolutionPolicy::Ignore => "ignore",
        }
    }
}

impl std::str::FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "push-successor" => Ok(ResolutionPolicy::PushSuccessor),
            "shrink-predecessor" => Ok(ResolutionPolicy::ShrinkPredecessor),
            "ignore" => Ok(ResolutionPolicy::Ignore),
            other => Err(format!(
                "unknown resolution policy '{}' (expected push-successor, shrink-predecessor or ignore)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proposed new schedule for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDelta {
    pub task_id: TaskId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Pluggable correction strategy
///
/// Implementations must be idempotent: resolving a violation against a
/// schedule that already carries the previous deltas proposes nothing new.
pub trait ViolationResolver {
    fn resolve(
        &self,
        violation: &Violation,
        tasks: &[Task],
        edges: &[Dependency],
        policy: ResolutionPolicy,
    ) -> Result<Vec<ScheduleDelta>, ResolveError>;
}

/// Moves whole tasks until the constrained date meets its bound
///
/// `PushSuccessor` delays the target, `ShrinkPredecessor` pulls the source
/// earlier, both keeping task durations. The gap is recomputed from the
/// schedule it is given, so a resolved edge yields no further deltas.
pub struct ShiftResolver<'a> {
    calendar: &'a dyn WorkingCalendar,
}

impl<'a> ShiftResolver<'a> {
    pub fn new(calendar: &'a dyn WorkingCalendar) -> Self {
        Self { calendar }
    }
}

impl ViolationResolver for ShiftResolver<'_> {
    fn resolve(
        &self,
        violation: &Violation,
        tasks: &[Task],
        edges: &[Dependency],
        policy: ResolutionPolicy,
    ) -> Result<Vec<ScheduleDelta>, ResolveError> {
        if policy == ResolutionPolicy::Ignore {
            return Ok(vec![]);
        }

        let Some(edge) = edges.iter().find(|e| e.id == violation.dependency_id) else {
            return Ok(vec![]);
        };
        let find = |id: &TaskId| {
            tasks
                .iter()
                .find(|t| &t.id == id)
                .ok_or_else(|| ResolveError::UnknownTask(id.clone()))
        };
        let source = find(&edge.source_task_id)?;
        let target = find(&edge.target_task_id)?;

        let (required, actual) = required_bound(edge, source, target, self.calendar);
        if actual >= required {
            return Ok(vec![]);
        }
        let gap = required - actual;

        let (task, shift) = match policy {
            ResolutionPolicy::PushSuccessor => (target, gap),
            _ => (source, -gap),
        };
        let out_of_range = || ResolveError::Resolver(format!("cannot move {} by {}", task.id, shift));

        Ok(vec![ScheduleDelta {
            task_id: task.id.clone(),
            start: task.start.checked_add_signed(shift).ok_or_else(out_of_range)?,
            end: task.end.checked_add_signed(shift).ok_or_else(out_of_range)?,
        }])
    }
}

/// Settings for an [`enforce`] run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforceOptions {
    pub policy: ResolutionPolicy,

    /// Round cap; never exceeds the number of edges
    pub max_rounds: Option<usize>,

    pub allow_shrink_predecessor: bool,
}

/// Outcome of an [`enforce`] run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcementReport {
    /// Schedule after all applied deltas
    pub tasks: Vec<Task>,

    /// Deltas that changed a task, in application order
    pub applied: Vec<ScheduleDelta>,

    pub rounds: usize,

    /// Violations left in the final schedule
    pub remaining: Vec<Violation>,

    /// True if the final schedule satisfies every edge
    pub converged: bool,
}

/// Runs bounded evaluate/resolve rounds over a copy of `tasks`
pub fn enforce(
    tasks: &[Task],
    edges: &[Dependency],
    resolver: &dyn ViolationResolver,
    options: &EnforceOptions,
    calendar: &dyn WorkingCalendar,
) -> Result<EnforcementReport, ResolveError> {
    if options.policy == ResolutionPolicy::ShrinkPredecessor && !options.allow_shrink_predecessor {
        return Err(ResolveError::PolicyDisallowed(options.policy));
    }

    let max_rounds = options
        .max_rounds
        .unwrap_or(edges.len())
        .min(edges.len());

    let mut schedule: Vec<Task> = tasks.to_vec();
    let mut applied = Vec::new();
    let mut rounds = 0;

    while rounds < max_rounds {
        let violations = evaluate_with(&schedule, edges, calendar);
        if violations.is_empty() || options.policy == ResolutionPolicy::Ignore {
            break;
        }
        rounds += 1;

        let mut changed = false;
        for violation in &violations {
            let deltas = resolver.resolve(violation, &schedule, edges, options.policy)?;
            for delta in deltas {
                if apply_delta(&mut schedule, &delta)? {
                    changed = true;
                    applied.push(delta);
                }
            }
        }

        tracing::debug!(round = rounds, violations = violations.len(), changed, "enforcement round");

        if !changed {
            break;
        }
    }

    let remaining = evaluate_with(&schedule, edges, calendar);
    let converged = remaining.is_empty();
    if !converged {
        tracing::debug!(remaining = remaining.len(), rounds, "enforcement stopped with violations");
    }

    Ok(EnforcementReport {
        tasks: schedule,
        applied,
        rounds,
        remaining,
        converged,
    })
}

/// Applies a delta in place; returns false if it changes nothing
fn apply_delta(schedule: &mut [Task], delta: &ScheduleDelta) -> Result<bool, ResolveError> {
    // First occurrence wins, matching evaluation
    let Some(i) = schedule.iter().position(|t| t.id == delta.task_id) else {
        return Err(ResolveError::UnknownTask(delta.task_id.clone()));
    };

    let task = &mut schedule[i];
    if task.start == delta.start && task.end == delta.end {
        return Ok(false);
    }
    task.start = delta.start;
    task.end = delta.end;
    Ok(true)
}
