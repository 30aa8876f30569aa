//! Rule-based classifier.
//!
//! Format comes from the content first (JSON parse, `%PDF-` magic, RFC 822
//! header block) and from the filename extension second. Intent comes from
//! keyword rules over the decoded text, first match wins.

use async_trait::async_trait;
use conduit_core::{ClassificationResult, DocumentFormat};
use conduit_runtime::Classifier;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

use crate::email::Message;
use crate::pdf;

static INTENT_RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Fraud Risk", r"(?i)\bfraud(ulent)?\b"),
        (
            "Regulation",
            r"(?i)\b(regulations?|regulatory|gdpr|fda|hipaa|pci-dss|compliance)\b",
        ),
        ("Invoice", r"(?i)\binvoice\b|\btotal\s+due\b"),
        ("RFQ", r"(?i)\b(rfq|quotation|quote)\b"),
        (
            "Complaint",
            r"(?i)\b(complaint|wrong item|refund|disappointed)\b",
        ),
    ]
    .into_iter()
    .map(|(intent, pattern)| (intent, Regex::new(pattern).unwrap()))
    .collect()
});

pub const UNKNOWN_INTENT: &str = "Unknown";

/// Only this much of the upload is examined for an email header block.
pub const HEADER_SCAN_BYTES: usize = 8 * 1024;

#[derive(Debug, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn detect_format(raw: &[u8], filename: &str) -> DocumentFormat {
        if parse_structured(raw).is_some() {
            return DocumentFormat::Json;
        }
        if raw.starts_with(pdf::PDF_MAGIC) {
            return DocumentFormat::Pdf;
        }
        let head = &raw[..raw.len().min(HEADER_SCAN_BYTES)];
        if Message::parse(&String::from_utf8_lossy(head)).has_known_header() {
            return DocumentFormat::Email;
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => DocumentFormat::Json,
            Some("pdf") => DocumentFormat::Pdf,
            Some("eml") => DocumentFormat::Email,
            _ => DocumentFormat::Unknown,
        }
    }

    pub fn detect_intent(format: DocumentFormat, raw: &[u8]) -> &'static str {
        let text = match format {
            DocumentFormat::Pdf => Cow::Owned(pdf::extract_text(raw)),
            _ => String::from_utf8_lossy(raw),
        };

        for &(intent, ref rule) in INTENT_RULES.iter() {
            if rule.is_match(&text) {
                return intent;
            }
            // Structured order requests count as quotes
            if intent == "RFQ" && is_order_request(raw) {
                return intent;
            }
        }
        UNKNOWN_INTENT
    }
}

/// JSON object or array; bare scalars are not treated as documents.
fn parse_structured(raw: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn is_order_request(raw: &[u8]) -> bool {
    parse_structured(raw)
        .and_then(|value| {
            let object = value.as_object()?;
            Some(object.contains_key("product") && object.contains_key("quantity"))
        })
        .unwrap_or(false)
}

#[async_trait]
impl Classifier for HeuristicClassifier {
    async fn classify(&self, raw: &[u8], filename: &str) -> anyhow::Result<ClassificationResult> {
        let format = Self::detect_format(raw, filename);
        let intent = Self::detect_intent(format, raw);
        tracing::debug!(filename, format = %format, intent, "Classified document");
        Ok(ClassificationResult::new(format, intent))
    }
}
