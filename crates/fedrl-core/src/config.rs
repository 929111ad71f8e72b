//! Client configuration: YAML file, then environment, then explicit setters.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FedrlError, Result};
use crate::storage;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1/";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const ENV_BASE_URL: &str = "FEDRL_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "FEDRL_TIMEOUT_MS";
pub const ENV_SESSION_FILE: &str = "FEDRL_SESSION_FILE";

/// Logging settings consumed by [`crate::logging::init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Also write JSON lines to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `https://host/api/v1/`.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Where the cookie jar lives.
    pub session_file: PathBuf,
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            session_file: config_dir().join("session.yaml"),
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `path` (must exist), or from `<config dir>/fedrl/config.yaml`
    /// when present, then apply environment overrides. Callers layer their own
    /// overrides on top and call [`ClientConfig::validate`] last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config: ClientConfig = match path {
            Some(p) if !p.exists() => {
                return Err(FedrlError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )))
            }
            Some(p) => storage::load_yaml(p)?,
            None => storage::load_yaml(&default_config_file())?,
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `FEDRL_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = raw.trim().parse().map_err(|_| {
                FedrlError::Config(format!("{} must be an integer, got {:?}", ENV_TIMEOUT_MS, raw))
            })?;
        }
        if let Some(path) = lookup(ENV_SESSION_FILE) {
            self.session_file = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(FedrlError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(FedrlError::Config("timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Join an API path onto the base URL. Leading slashes on `path` do not
    /// reset to the host root.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fedrl")
}

pub fn default_config_file() -> PathBuf {
    config_dir().join("config.yaml")
}
