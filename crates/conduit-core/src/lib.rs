use serde::{Deserialize, Serialize};
use std::fmt;

// Configuration types shared across all Conduit crates
pub mod config;

pub mod action;

pub use action::{ActionOutcome, ActionSuggestion, OutcomeStatus, Target};
pub use config::{ConduitConfig, ConfigError, MemoryBackend, MemoryConfig, RouterConfig, ServerConfig};

/// Structured payload carried by events and extractions.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Document format as decided by a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    #[serde(rename = "JSON")]
    Json,
    Email,
    #[serde(rename = "PDF")]
    Pdf,
    Unknown,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Email => "Email",
            Self::Pdf => "PDF",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the classifier for one ingest request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub format: DocumentFormat,
    pub intent: String,
}

impl ClassificationResult {
    pub fn new(format: DocumentFormat, intent: impl Into<String>) -> Self {
        Self {
            format,
            intent: intent.into(),
        }
    }
}

/// What a format-specific extractor returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// Producer identifier written as the event source, e.g. "json_agent".
    pub source: String,
    pub data: JsonMap,
    pub action_suggestion: ActionSuggestion,
}

/// Externally visible result of a completed ingest request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub metadata: ClassificationResult,
    pub extraction: JsonMap,
    pub action: ActionOutcome,
}
