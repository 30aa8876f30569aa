//! Event log ("memory") configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: MemoryBackend,

    /// JSON Lines file used by the `file` backend.
    #[serde(default = "default_path")]
    pub path: String,
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// Keep events in process memory only.
    #[default]
    Memory,
    /// Append events to a JSON Lines file and reload them on start.
    File,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::default(),
            path: default_path(),
        }
    }
}

fn default_path() -> String {
    "data/memory-events.jsonl".to_string()
}
