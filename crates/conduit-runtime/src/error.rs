//! Error types for the ingest pipeline.

use conduit_core::DocumentFormat;
use thiserror::Error;

use crate::dispatcher::IngestStage;

/// Failures that abort an ingest request.
///
/// Routing problems and log-write failures are not here: they are recovered
/// locally and reported inside the response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The classifier raised an error.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    /// No extractor exists for the classified format.
    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: DocumentFormat },

    /// The selected extractor raised an error.
    #[error("extraction failed for {format} document: {message}")]
    ExtractionFailed {
        format: DocumentFormat,
        message: String,
    },
}

impl DispatchError {
    /// Last stage the request reached before failing.
    pub fn reached_stage(&self) -> IngestStage {
        match self {
            Self::ClassificationFailed(_) => IngestStage::Received,
            Self::UnsupportedFormat { .. } | Self::ExtractionFailed { .. } => {
                IngestStage::Classified
            }
        }
    }

    /// Name of the pipeline step that failed.
    pub fn failed_step(&self) -> &'static str {
        match self {
            Self::ClassificationFailed(_) => "classification",
            Self::UnsupportedFormat { .. } => "extractor selection",
            Self::ExtractionFailed { .. } => "extraction",
        }
    }

    /// Whether the caller sent something we cannot handle (vs. a server fault).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }
}
