//! Constraint evaluation
//!
//! Checks a concrete schedule against the precedence edges. Evaluation is a
//! pure function of its inputs: violations come out in edge order and edges
//! whose endpoints are missing from the schedule are skipped, which is what a
//! filtered view of the programme needs.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::{CalendarDays, WorkingCalendar};
use super::dependency::{Dependency, DependencyType};
use super::id::{DependencyId, TaskId};
use super::task::Task;

/// Violation severity
///
/// Every breach is reported at the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
}

/// A precedence edge the schedule does not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub dependency_id: DependencyId,
    pub source_task_id: TaskId,
    pub target_task_id: TaskId,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
    pub lag: i32,
    /// Earliest instant the constrained target date may take
    pub required: DateTime<Utc>,
    /// The constrained target date as scheduled
    pub actual: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// Evaluates the schedule with calendar-day lags
pub fn evaluate(tasks: &[Task], edges: &[Dependency]) -> Vec<Violation> {
    evaluate_with(tasks, edges, &CalendarDays)
}

/// Evaluates the schedule, converting lags through `calendar`
pub fn evaluate_with(
    tasks: &[Task],
    edges: &[Dependency],
    calendar: &dyn WorkingCalendar,
) -> Vec<Violation> {
    let mut by_id: HashMap<&TaskId, &Task> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        by_id.entry(&task.id).or_insert(task);
    }

    edges
        .iter()
        .filter_map(|edge| {
            let (Some(source), Some(target)) = (
                by_id.get(&edge.source_task_id),
                by_id.get(&edge.target_task_id),
            ) else {
                tracing::trace!(dependency = %edge.id, "endpoint outside schedule, skipped");
                return None;
            };
            check_edge(edge, source, target, calendar)
        })
        .collect()
}

/// Returns the bound an edge imposes and the target date it constrains
pub fn required_bound(
    edge: &Dependency,
    source: &Task,
    target: &Task,
    calendar: &dyn WorkingCalendar,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let reference = if edge.dep_type.from_source_start() {
        source.start
    } else {
        source.end
    };
    let actual = if edge.dep_type.constrains_target_start() {
        target.start
    } else {
        target.end
    };
    (calendar.offset(reference, edge.lag), actual)
}

fn check_edge(
    edge: &Dependency,
    source: &Task,
    target: &Task,
    calendar: &dyn WorkingCalendar,
) -> Option<Violation> {
    let (required, actual) = required_bound(edge, source, target, calendar);
    if actual >= required {
        return None;
    }

    Some(Violation {
        dependency_id: edge.id.clone(),
        source_task_id: edge.source_task_id.clone(),
        target_task_id: edge.target_task_id.clone(),
        dep_type: edge.dep_type,
        lag: edge.lag,
        required,
        actual,
        message: describe(edge, required, actual),
        severity: Severity::Error,
    })
}

fn describe(edge: &Dependency, required: DateTime<Utc>, actual: DateTime<Utc>) -> String {
    let verb = if edge.dep_type.constrains_target_start() {
        "start"
    } else {
        "finish"
    };
    format!(
        "{} {} -> {} (lag {}): {} {}s {} but must not {} before {}",
        edge.dep_type,
        edge.source_task_id,
        edge.target_task_id,
        edge.lag,
        edge.target_task_id,
        verb,
        format_instant(actual),
        verb,
        format_instant(required),
    )
}

fn format_instant(instant: DateTime<Utc>) -> String {
    if instant.time() == NaiveTime::MIN {
        instant.format("%Y-%m-%d").to_string()
    } else {
        instant.to_rfc3339()
    }
}
