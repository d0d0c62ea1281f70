use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The only host the local backend accepts
pub const LOCALHOST: &str = "localhost";

pub const LOCAL_SCHEMES: &[&str] = &["fork", "local"];
pub const SSH_SCHEMES: &[&str] = &["ssh"];

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const POLL_INTERVAL_ENV: &str = "JOBWARDEN_POLL_INTERVAL_MS";
pub const LOG_ENV: &str = "JOBWARDEN_LOG";
pub const CONFIG_ENV: &str = "JOBWARDEN_CONFIG";

pub const CONFIG_DIRECTORY: &str = ".jobwarden";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Runtime settings shared by every backend a [`crate::Runtime`] creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interval between polls in bounded waits
    pub poll_interval_ms: u64,
    /// Log filter directive handed to the logger when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Backend factory names skipped at initialization
    pub disabled_backends: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            log_level: None,
            disabled_backends: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn is_backend_disabled(&self, name: &str) -> bool {
        self.disabled_backends
            .iter()
            .any(|disabled| disabled.eq_ignore_ascii_case(name))
    }

    /// Default config file location (`~/.jobwarden/config.json`), overridable via `JOBWARDEN_CONFIG`
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|home| home.join(CONFIG_DIRECTORY).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, then apply environment overrides.
    ///
    /// A missing or malformed file yields the defaults.
    pub fn load() -> Self {
        let config = Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        config.with_env_overrides()
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    crate::logging::warn(format!(
                        "Ignoring malformed config {}: {}",
                        path.display(),
                        err
                    ));
                    Self::default()
                }
            },
            Err(err) => {
                crate::logging::warn(format!("Cannot read config {}: {}", path.display(), err));
                Self::default()
            }
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = std::env::var(POLL_INTERVAL_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            self.poll_interval_ms = ms;
        }
        if let Ok(level) = std::env::var(LOG_ENV) {
            if !level.trim().is_empty() {
                self.log_level = Some(level);
            }
        }
        self
    }
}
