//! Configuration types for the Conduit ingest service.
//!
//! Configuration is loaded from a single TOML file (`conduit.toml` by
//! default) and then adjusted from the environment.
//!
//! # Sections
//!
//! - **server**: bind address, default log level and upload size limit
//! - **router**: base URL of the action destinations and retry policy
//! - **memory**: event log storage backend

pub mod memory;
pub mod router;
pub mod server;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use memory::{MemoryBackend, MemoryConfig};
pub use router::RouterConfig;
pub use server::ServerConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CONDUIT_CONFIG";
/// Environment variable overriding `router.base_url`.
pub const BASE_URL_ENV: &str = "BASE_URL";
/// Environment variable overriding `server.bind`.
pub const BIND_ENV: &str = "CONDUIT_BIND";

const DEFAULT_CONFIG_FILE: &str = "conduit.toml";

/// Complete Conduit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConduitConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Action router settings.
    #[serde(default)]
    pub router: RouterConfig,

    /// Event log settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConduitConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Resolve the config path, load it if present, then apply environment
    /// overrides. A missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_path(explicit, std::env::var(CONFIG_PATH_ENV).ok());
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.router.base_url = url;
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.server.bind = bind;
        }
    }
}

fn resolve_path(explicit: Option<&Path>, from_env: Option<String>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = from_env {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
