use async_trait::async_trait;
use conduit_core::{ClassificationResult, DocumentFormat, Extraction};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns raw bytes into a `{format, intent}` pair.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, raw: &[u8], filename: &str) -> anyhow::Result<ClassificationResult>;
}

/// Format-specific field extraction. Returns the extracted data plus a
/// suggested follow-up action.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        raw: &[u8],
        metadata: &ClassificationResult,
    ) -> anyhow::Result<Extraction>;
}

/// Extractors keyed by document format.
///
/// Only `Email`, `JSON` and `PDF` can ever be selected; `Unknown` never
/// resolves to an extractor.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentFormat, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extractor` for `format`. Registering for `Unknown` is ignored.
    pub fn with(mut self, format: DocumentFormat, extractor: Arc<dyn Extractor>) -> Self {
        if format == DocumentFormat::Unknown {
            tracing::warn!("Ignoring extractor registered for the Unknown format");
            return self;
        }
        self.extractors.insert(format, extractor);
        self
    }

    pub fn get(&self, format: DocumentFormat) -> Option<&Arc<dyn Extractor>> {
        match format {
            DocumentFormat::Email | DocumentFormat::Json | DocumentFormat::Pdf => {
                self.extractors.get(&format)
            }
            DocumentFormat::Unknown => None,
        }
    }
}
