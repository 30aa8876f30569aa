//! Action router configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where `/crm` and `/risk_alert` live and how hard to try reaching them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Base URL of the action destinations.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Retries after the first attempt (total attempts = max_retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed pause between attempts in seconds.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl RouterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_backoff_secs() -> u64 {
    1
}
