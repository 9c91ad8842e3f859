//! Runtime configuration and well-known paths.
//!
//! Everything lives under `~/.claude/monitor`, shared with the hook scripts
//! that drop waiting markers. The config file is optional; every key has a
//! default, and a missing file yields [`PulseConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Deserialize;

use crate::error::{PulseError, Result};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_ACTIVE_CPU_THRESHOLD: f64 = 3.0;
pub const DEFAULT_MARKER_RETENTION_SECS: i64 = 60 * 60;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PROCESS_PATTERN: &str = "claude --";
pub const DEFAULT_STATUS_GLYPH: &str = "\u{26A1}";

const CONFIG_FILE_NAME: &str = "pulse.toml";

/// Returns the monitor directory (~/.claude/monitor).
pub fn monitor_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join("monitor"))
}

/// Returns the directory the hook scripts drop waiting markers into.
pub fn default_marker_dir() -> Option<PathBuf> {
    monitor_dir().map(|dir| dir.join("waiting"))
}

/// Returns the path to the config file.
pub fn default_config_path() -> Option<PathBuf> {
    monitor_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Returns the directory for rolling log files.
pub fn default_log_dir() -> Option<PathBuf> {
    monitor_dir().map(|dir| dir.join("logs"))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub poll_interval_secs: u64,
    pub active_cpu_threshold: f64,
    /// `None` resolves to [`default_marker_dir`].
    pub marker_dir: Option<PathBuf>,
    pub marker_retention_secs: i64,
    pub command_timeout_secs: u64,
    /// Substring of the agent's command line that marks a process as an agent.
    pub process_pattern: String,
    pub status_glyph: String,
    /// Argv run on every alert (e.g. a sound player). Empty disables it.
    pub alert_command: Vec<String>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            active_cpu_threshold: DEFAULT_ACTIVE_CPU_THRESHOLD,
            marker_dir: None,
            marker_retention_secs: DEFAULT_MARKER_RETENTION_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            process_pattern: DEFAULT_PROCESS_PATTERN.to_string(),
            status_glyph: DEFAULT_STATUS_GLYPH.to_string(),
            alert_command: Vec::new(),
        }
    }
}

impl PulseConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    /// Out-of-range values fall back to the default window.
    pub fn marker_retention(&self) -> ChronoDuration {
        ChronoDuration::try_seconds(self.marker_retention_secs.max(0))
            .unwrap_or_else(|| ChronoDuration::seconds(DEFAULT_MARKER_RETENTION_SECS))
    }

    pub fn resolve_marker_dir(&self) -> Result<PathBuf> {
        match &self.marker_dir {
            Some(dir) => Ok(expand_home(dir)),
            None => default_marker_dir().ok_or(PulseError::HomeDirNotFound),
        }
    }
}

/// Loads the config from `path`, or from [`default_config_path`] when `None`.
pub fn load_config(path: Option<&Path>) -> Result<PulseConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path().ok_or(PulseError::HomeDirNotFound)?,
    };

    if !config_path.exists() {
        return Ok(PulseConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| PulseError::Io {
        context: format!("reading config {}", config_path.display()),
        source: err,
    })?;
    parse_config(&content).map_err(|details| PulseError::ConfigMalformed {
        path: config_path,
        details,
    })
}

fn parse_config(content: &str) -> std::result::Result<PulseConfig, String> {
    let config = toml::from_str::<PulseConfig>(content).map_err(|err| err.to_string())?;
    if ChronoDuration::try_seconds(config.marker_retention_secs).is_none() {
        return Err(format!(
            "marker_retention_secs out of range: {}",
            config.marker_retention_secs
        ));
    }
    Ok(config)
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
