//! Schedule check command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::output::Output;
use crate::domain::{
    enforce, evaluate_with, EnforcementReport, ProjectId, ResolutionPolicy, ShiftResolver, Task,
};
use crate::storage::Workspace;

pub fn run(
    output: &Output,
    project_str: &str,
    tasks_path: &Path,
    enforce_schedule: bool,
    policy: Option<ResolutionPolicy>,
) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let project: ProjectId = project_str.parse()?;
    let tasks = read_tasks(tasks_path)?;

    for task in tasks.iter().filter(|t| !t.is_well_formed()) {
        tracing::warn!(task = %task.id, "task ends before it starts");
    }

    let snapshot = repo.snapshot(&project)?;
    let calendar = workspace.calendar();

    if enforce_schedule {
        let mut options = workspace.config().workspace.enforcement.clone();
        if let Some(policy) = policy {
            options.policy = policy;
        }

        let resolver = ShiftResolver::new(calendar.as_ref());
        let report = enforce(&tasks, snapshot.edges(), &resolver, &options, calendar.as_ref())?;

        tracing::debug!(
            project = %project,
            policy = %options.policy,
            rounds = report.rounds,
            applied = report.applied.len(),
            "enforced schedule"
        );
        return print_report(output, &report);
    }

    let violations = evaluate_with(&tasks, snapshot.edges(), calendar.as_ref());

    tracing::debug!(
        project = %project,
        tasks = tasks.len(),
        edges = snapshot.edges().len(),
        violations = violations.len(),
        "evaluated schedule"
    );

    if output.is_json() {
        output.data(&violations);
    } else if violations.is_empty() {
        println!(
            "No violations ({} tasks, {} dependencies)",
            tasks.len(),
            snapshot.edges().len()
        );
    } else {
        for violation in &violations {
            println!("{}  {}", violation.dependency_id, violation.message);
        }
    }

    if !violations.is_empty() {
        bail!("{} constraint violation(s) found", violations.len());
    }

    Ok(())
}

fn print_report(output: &Output, report: &EnforcementReport) -> Result<()> {
    if output.is_json() {
        output.data(report);
    } else {
        for delta in &report.applied {
            println!(
                "Moved {}: {} .. {}",
                delta.task_id,
                delta.start.format("%Y-%m-%d"),
                delta.end.format("%Y-%m-%d")
            );
        }
        for violation in &report.remaining {
            println!("{}  {}", violation.dependency_id, violation.message);
        }
        if report.converged {
            println!(
                "Schedule satisfies all dependencies after {} round(s)",
                report.rounds
            );
        }
    }

    if !report.converged {
        bail!(
            "{} constraint violation(s) remain after {} round(s)",
            report.remaining.len(),
            report.rounds
        );
    }

    Ok(())
}

/// Reads tasks from a JSON array or a JSONL file
fn read_tasks(path: &Path) -> Result<Vec<Task>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tasks: {}", path.display()))?;

    parse_tasks(&content).with_context(|| format!("Invalid task file: {}", path.display()))
}

fn parse_tasks(content: &str) -> Result<Vec<Task>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let tasks = parse_tasks(
            r#"[
  {"id": "a", "start": "2024-01-01T00:00:00Z", "end": "2024-01-10T00:00:00Z"},
  {"id": "b", "start": "2024-01-11T00:00:00Z", "end": "2024-01-12T00:00:00Z"}
]"#,
        )
        .unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].id.as_str(), "b");
    }

    #[test]
    fn parses_jsonl_and_skips_blank_lines() {
        let tasks = parse_tasks(
            "{\"id\":\"a\",\"start\":\"2024-01-01T00:00:00Z\",\"end\":\"2024-01-10T00:00:00Z\"}\n\n\
             {\"id\":\"b\",\"start_date\":\"2024-01-11T00:00:00Z\",\"end_date\":\"2024-01-12T00:00:00Z\"}\n",
        )
        .unwrap();

        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_tasks(
            "{\"id\":\"a\",\"start\":\"2024-01-01T00:00:00Z\",\"end\":\"2024-01-10T00:00:00Z\"}\nnot json\n",
        )
        .unwrap_err();

        assert!(format!("{:#}", err).contains("line 2"));
    }
}
