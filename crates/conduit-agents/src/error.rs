use thiserror::Error;

/// Failures raised by the built-in extractors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("not a PDF document: missing %PDF- header")]
    MissingPdfHeader,
}
