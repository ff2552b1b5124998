//! # Command-Line Interface
//!
//! User-facing commands over a workspace's dependency repository.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Workspace setup | `init` |
//! | Dep | Edge management | `dep add`, `dep list`, `dep rm`, `dep order` |
//! | Check | Schedule evaluation | `check site --tasks schedule.json` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Diagnostics
//!
//! Logs go to stderr. Use `--log-level debug` (or `-v`) to see them:
//! ```bash
//! ganttdeps -v dep add site excavate foundations
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod dep;
mod check;

pub use app::{Cli, Commands, LogLevel, run};
pub use output::{Output, OutputFormat};
