//! Logger setup
//!
//! Installs a `tracing_subscriber` registry for binaries and tests that want
//! to see what the runtime and backends are doing.

use crate::config::LOG_ENV;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when no directive is given and neither `JOBWARDEN_LOG` nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str = "info,jobwarden=debug";

/// Pick the filter directive: explicit, then `JOBWARDEN_LOG`, then `RUST_LOG`, then the default
pub fn resolve_filter(explicit: Option<&str>) -> Result<EnvFilter> {
    let from_env = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());
    let directive = explicit
        .map(str::to_string)
        .or_else(|| from_env(LOG_ENV))
        .or_else(|| from_env(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());
    EnvFilter::try_new(&directive).with_context(|| format!("invalid log filter '{}'", directive))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Install the global subscriber: compact lines on stderr, plus plain-text
/// lines appended to `log_file` when given.
///
/// Fails when a subscriber is already installed.
///
/// ```no_run
/// jobwarden::utils::logger::init_logger(Some("debug"), None).unwrap();
/// ```
pub fn init_logger(filter: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let file_layer = log_file
        .map(open_log_file)
        .transpose()?
        .map(|file| fmt::layer().with_writer(Arc::new(file)).with_ansi(false));

    tracing_subscriber::registry()
        .with(resolve_filter(filter)?)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!(target: "jobwarden", "logger initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    #[serial]
    fn test_explicit_filter_wins() {
        std::env::set_var(LOG_ENV, "trace");
        let filter = resolve_filter(Some("warn")).unwrap();
        std::env::remove_var(LOG_ENV);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    #[serial]
    fn test_jobwarden_log_beats_rust_log() {
        std::env::set_var(LOG_ENV, "error");
        let filter = resolve_filter(None).unwrap();
        std::env::remove_var(LOG_ENV);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_invalid_filter_is_an_error() {
        assert!(resolve_filter(Some("jobwarden=notalevel")).is_err());
    }

    #[test]
    fn test_log_file_parent_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("jobwarden.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
