//! Configuration loading from kvlog.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use storage::LogConfig;

/// Environment variable selecting the backend (`file` or `table`).
pub const ENV_BACKEND: &str = "KVLOG_BACKEND";
/// Environment variable overriding the log location.
pub const ENV_PATH: &str = "KVLOG_PATH";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Event log backend and location.
    #[serde(default = "default_log")]
    pub log: LogConfig,
}

fn default_log() -> LogConfig {
    LogConfig::file(default_data_dir().join("transaction.log"))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a default configuration: a log file in the data directory.
    pub fn default_config() -> Self {
        Self { log: default_log() }
    }

    /// Apply `KVLOG_BACKEND` / `KVLOG_PATH` overrides.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = lookup(ENV_PATH);

        if let Some(backend) = lookup(ENV_BACKEND) {
            let target = path.clone().unwrap_or_else(|| self.log.target());
            self.log = match (backend.as_str(), &self.log) {
                ("file", LogConfig::File { sync, .. }) => LogConfig::File {
                    path: PathBuf::from(target),
                    sync: *sync,
                },
                ("file", _) => LogConfig::file(target),
                ("table", _) => LogConfig::table(target),
                (other, _) => return Err(ConfigError::UnknownBackend(other.to_string())),
            };
        } else if let Some(path) = path {
            self.log = match self.log {
                LogConfig::File { sync, .. } => LogConfig::File {
                    path: PathBuf::from(path),
                    sync,
                },
                LogConfig::Table { .. } => LogConfig::table(path),
            };
        }

        Ok(self)
    }
}

/// Per-user data directory for the default log location.
pub fn default_data_dir() -> PathBuf {
    data_dir_from(|name| std::env::var(name).ok()).unwrap_or_else(|| ".kvlog".into())
}

/// `%APPDATA%\kvlog` on Windows, `$XDG_DATA_HOME/kvlog` (falling back to
/// `~/.local/share/kvlog`) elsewhere.
fn data_dir_from(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let set = |name: &str| lookup(name).filter(|dir| !dir.is_empty());
    let base = if cfg!(windows) {
        set("APPDATA").map(PathBuf::from)
    } else {
        set("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| set("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
    };
    base.map(|dir| dir.join("kvlog"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unknown backend '{0}': expected 'file' or 'table'")]
    UnknownBackend(String),
}
