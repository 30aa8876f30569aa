//! # conduit-agents
//!
//! Built-in implementations of the pipeline capabilities:
//!
//! | Type | Capability | Event source |
//! |------|------------|--------------|
//! | [`HeuristicClassifier`] | `Classifier` | `classifier` |
//! | [`EmailExtractor`] | `Extractor` for `Email` | `email_agent` |
//! | [`JsonExtractor`] | `Extractor` for `JSON` | `json_agent` |
//! | [`PdfExtractor`] | `Extractor` for `PDF` | `pdf_agent` |
//!
//! All of them are deterministic and work offline.

use conduit_core::DocumentFormat;
use conduit_runtime::ExtractorRegistry;
use std::sync::Arc;

pub mod classifier;
pub mod email;
pub mod error;
pub mod json;
pub mod pdf;

pub use classifier::HeuristicClassifier;
pub use email::EmailExtractor;
pub use error::AgentError;
pub use json::JsonExtractor;
pub use pdf::PdfExtractor;

/// Registry with one built-in extractor per supported format.
pub fn default_extractors() -> ExtractorRegistry {
    ExtractorRegistry::new()
        .with(DocumentFormat::Email, Arc::new(EmailExtractor::new()))
        .with(DocumentFormat::Json, Arc::new(JsonExtractor::new()))
        .with(DocumentFormat::Pdf, Arc::new(PdfExtractor::new()))
}
