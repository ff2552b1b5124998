//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{check, dep};
use crate::domain::ResolutionPolicy;
use crate::logging;
use crate::storage::{Config, Workspace};

#[derive(Parser)]
#[command(name = "ganttdeps")]
#[command(author, version, about = "Precedence constraints for project schedules")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Shorthand for --log-level debug
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Log level for diagnostics on stderr
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log levels accepted by `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ganttdeps workspace
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Manage dependencies between tasks
    #[command(subcommand)]
    Dep(dep::DepCommands),

    /// Check a schedule against a project's dependencies
    Check {
        /// Project ID
        project: String,

        /// Task file (JSON array or one JSON object per line)
        #[arg(long)]
        tasks: PathBuf,

        /// Move tasks to satisfy the dependencies using the [enforcement] settings
        #[arg(long)]
        enforce: bool,

        /// Resolution policy overriding the configured one
        #[arg(long, requires = "enforce")]
        policy: Option<ResolutionPolicy>,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config errors surface later, when the command opens the workspace
    let workspace_config = Config::find_workspace_root()
        .and_then(|root| Config::for_workspace(&root).ok());
    let config_level = workspace_config
        .as_ref()
        .and_then(|config| config.workspace.log_level.clone());

    logging::init_logging(logging::resolve_level(
        cli.log_level,
        cli.verbose,
        config_level.as_deref(),
    ))?;

    let format = match cli.format {
        Some(format) => format,
        None => match workspace_config {
            Some(config) => OutputFormat::from(config.global.default_format),
            None => Config::load_global()
                .map(|global| OutputFormat::from(global.default_format))
                .unwrap_or_default(),
        },
    };
    let output = Output::new(format);

    tracing::debug!(?format, "ganttdeps starting");

    match cli.command {
        Commands::Init { path } => {
            let workspace = Workspace::init(path)?;
            output.success(&format!(
                "Initialized ganttdeps workspace at {}",
                workspace.root().display()
            ));
        }

        Commands::Dep(cmd) => dep::run(cmd, &output)?,

        Commands::Check {
            project,
            tasks,
            enforce,
            policy,
        } => check::run(&output, &project, &tasks, enforce, policy)?,
    }

    Ok(())
}
