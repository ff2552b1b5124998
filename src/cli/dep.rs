//! Dependency CLI commands

use anyhow::{bail, Result};
use clap::Subcommand;

use super::output::Output;
use crate::domain::{
    Dependency, DependencyId, DependencyPatch, DependencyType, NewDependency, ProjectId, TaskId,
};
use crate::storage::Workspace;

#[derive(Subcommand)]
pub enum DepCommands {
    /// Add a dependency: TARGET waits on SOURCE
    ///
    /// Examples:
    ///   ganttdeps dep add tower excavate foundations            # FS, no lag
    ///   ganttdeps dep add tower pour cure --type ss --lag 2     # SS, 2 day lag
    ///   ganttdeps dep add tower frame roof --lag -1             # FS, 1 day lead
    Add {
        /// Project ID
        project: String,

        /// Predecessor task
        source: String,

        /// Successor task
        target: String,

        /// Dependency type (FS, SS, FF, SF)
        #[arg(long = "type", short = 't')]
        dep_type: Option<DependencyType>,

        /// Lag in days (negative for a lead)
        #[arg(long, allow_negative_numbers = true)]
        lag: Option<i32>,
    },

    /// List a project's dependencies
    List {
        /// Project ID
        project: String,

        /// Only edges entering or leaving this task
        #[arg(long)]
        task: Option<String>,
    },

    /// Show dependency details
    Show {
        /// Dependency ID
        id: String,
    },

    /// Change the type or lag of a dependency
    Update {
        /// Dependency ID
        id: String,

        /// New dependency type
        #[arg(long = "type", short = 't')]
        dep_type: Option<DependencyType>,

        /// New lag in days
        #[arg(long, allow_negative_numbers = true)]
        lag: Option<i32>,
    },

    /// Remove a dependency
    Rm {
        /// Dependency ID
        id: String,
    },

    /// Remove every dependency of a project
    Clear {
        /// Project ID
        project: String,

        /// Confirm removal
        #[arg(long, required = true)]
        yes: bool,
    },

    /// Print a project's tasks predecessors-first
    Order {
        /// Project ID
        project: String,
    },
}

pub fn run(cmd: DepCommands, output: &Output) -> Result<()> {
    match cmd {
        DepCommands::Add {
            project,
            source,
            target,
            dep_type,
            lag,
        } => add_dependency(output, &project, &source, &target, dep_type, lag),
        DepCommands::List { project, task } => list_dependencies(output, &project, task.as_deref()),
        DepCommands::Show { id } => show_dependency(output, &id),
        DepCommands::Update { id, dep_type, lag } => {
            update_dependency(output, &id, DependencyPatch { dep_type, lag })
        }
        DepCommands::Rm { id } => remove_dependency(output, &id),
        DepCommands::Clear { project, .. } => clear_project(output, &project),
        DepCommands::Order { project } => print_order(output, &project),
    }
}

fn add_dependency(
    output: &Output,
    project_str: &str,
    source_str: &str,
    target_str: &str,
    dep_type: Option<DependencyType>,
    lag: Option<i32>,
) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let project: ProjectId = project_str.parse()?;
    let source: TaskId = source_str.parse()?;
    let target: TaskId = target_str.parse()?;

    let mut new = NewDependency::new(project, source, target);
    if let Some(dep_type) = dep_type {
        new = new.with_type(dep_type);
    }
    if let Some(lag) = lag {
        new = new.with_lag(lag);
    }

    let dep = repo.create(new, &workspace.config().workspace.policy)?;

    if output.is_json() {
        output.data(&dep);
    } else {
        output.success(&format!(
            "Created dependency {} ({})",
            dep.id,
            describe(&dep)
        ));
    }

    Ok(())
}

fn list_dependencies(output: &Output, project_str: &str, task_str: Option<&str>) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;
    let project: ProjectId = project_str.parse()?;

    match task_str {
        Some(task_str) => {
            let task: TaskId = task_str.parse()?;
            let deps = repo.list_by_task(&project, &task)?;

            if output.is_json() {
                output.data(&deps);
                return Ok(());
            }

            println!("Predecessors of {}:", task);
            print_table(output, &deps.predecessors);
            println!();
            println!("Successors of {}:", task);
            print_table(output, &deps.successors);
        }
        None => {
            let deps = repo.list_by_project(&project)?;

            if output.is_json() {
                output.data(&deps);
                return Ok(());
            }

            if deps.is_empty() {
                println!("No dependencies in {}", project);
            } else {
                print_table(output, &deps);
            }
        }
    }

    Ok(())
}

fn show_dependency(output: &Output, id_str: &str) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let id: DependencyId = id_str.parse()?;
    let dep = repo.get(&id)?;

    if output.is_json() {
        output.data(&dep);
    } else {
        println!("{}", dep.id);
        println!("  Project: {}", dep.project_id);
        println!("  Source:  {}", dep.source_task_id);
        println!("  Target:  {}", dep.target_task_id);
        println!("  Type:    {}", dep.dep_type);
        println!("  Lag:     {}", dep.lag);
        println!("  Created: {}", dep.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Updated: {}", dep.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

fn update_dependency(output: &Output, id_str: &str, patch: DependencyPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("Nothing to update: pass --type and/or --lag");
    }

    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let id: DependencyId = id_str.parse()?;
    let dep = repo.update(&id, patch, &workspace.config().workspace.policy)?;

    if output.is_json() {
        output.data(&dep);
    } else {
        output.success(&format!("Updated dependency {} ({})", dep.id, describe(&dep)));
    }

    Ok(())
}

fn remove_dependency(output: &Output, id_str: &str) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let id: DependencyId = id_str.parse()?;
    repo.delete(&id)?;

    if output.is_json() {
        output.data(&serde_json::json!({ "removed": id.to_string() }));
    } else {
        output.success(&format!("Removed dependency {}", id));
    }

    Ok(())
}

fn clear_project(output: &Output, project_str: &str) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let project: ProjectId = project_str.parse()?;
    let removed = repo.clear_project(&project)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "project": project.to_string(),
            "removed": removed,
        }));
    } else {
        output.success(&format!("Removed {} dependencies from {}", removed, project));
    }

    Ok(())
}

fn print_order(output: &Output, project_str: &str) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let repo = workspace.repository()?;

    let project: ProjectId = project_str.parse()?;
    let order = repo.topological_order(&project)?;

    if output.is_json() {
        output.data(&order);
    } else {
        for (i, task) in order.iter().enumerate() {
            println!("{:>3}. {}", i + 1, task);
        }
    }

    Ok(())
}

fn describe(dep: &Dependency) -> String {
    format!(
        "{} -> {}, {}, lag {}",
        dep.source_task_id,
        dep.target_task_id,
        dep.dep_type.code(),
        dep.lag
    )
}

fn print_table(output: &Output, deps: &[Dependency]) {
    for dep in deps {
        output.row(&[
            &dep.id.to_string(),
            dep.dep_type.code(),
            dep.source_task_id.as_str(),
            "->",
            dep.target_task_id.as_str(),
            &format!("lag {}", dep.lag),
        ]);
    }
}
