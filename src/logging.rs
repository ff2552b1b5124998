//! Logging setup for `ganttdeps` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `--verbose` (debug)
//! 3. `GANTTDEPS_LOG` environment variable (e.g. "info", "debug")
//! 4. `log_level` in the workspace config
//! 5. default to `warn`
//!
//! Events go to stderr so JSON output on stdout stays machine-readable.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "GANTTDEPS_LOG";

/// Resolves the effective level from the sources above
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    verbose: bool,
    config_level: Option<&str>,
) -> tracing::Level {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl);
    }
    if verbose {
        return tracing::Level::DEBUG;
    }
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|s| parse_level_str(&s))
        .or_else(|| config_level.and_then(parse_level_str))
        .unwrap_or(tracing::Level::WARN)
}

/// Initialise global logging subscriber.
///
/// Safe to call once at startup; a second call is an error.
pub fn init_logging(level: tracing::Level) -> Result<()> {
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level_str("Warning"), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str(" trace "), Some(tracing::Level::TRACE));
        assert_eq!(parse_level_str("loud"), None);
    }

    #[test]
    fn flag_beats_everything() {
        assert_eq!(
            resolve_level(Some(LogLevel::Error), true, Some("trace")),
            tracing::Level::ERROR
        );
        assert_eq!(resolve_level(None, true, Some("error")), tracing::Level::DEBUG);
    }
}
