//! Ingest dispatcher.
//!
//! One request moves through
//! `Received -> Classified -> Extracted -> Routed -> Completed`; a failure at
//! any step ends it in `Failed` and skips the remaining steps. The
//! dispatcher never retries a step itself.

use conduit_core::{ActionOutcome, IngestResponse};
use conduit_memory::{EventLog, keys, sources};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::capability::{Classifier, ExtractorRegistry};
use crate::error::DispatchError;
use crate::router::ActionRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Classified,
    Extracted,
    Routed,
    Completed,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::Extracted => "extracted",
            Self::Routed => "routed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Payload of the router's `action` event: the outcome plus the verb that
/// produced it, so audits can filter by action.
#[derive(Serialize)]
struct ActionRecord<'a> {
    action: &'a str,
    #[serde(flatten)]
    outcome: &'a ActionOutcome,
}

pub struct Dispatcher {
    classifier: Arc<dyn Classifier>,
    extractors: ExtractorRegistry,
    router: Arc<ActionRouter>,
    memory: Arc<EventLog>,
}

impl Dispatcher {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        extractors: ExtractorRegistry,
        router: Arc<ActionRouter>,
        memory: Arc<EventLog>,
    ) -> Self {
        Self {
            classifier,
            extractors,
            router,
            memory,
        }
    }

    pub fn memory(&self) -> &Arc<EventLog> {
        &self.memory
    }

    /// Run one ingest request end to end.
    ///
    /// Classification and extraction failures abort the request. Routing
    /// failures do not: the response carries an `error` outcome instead.
    pub async fn handle_ingest(
        &self,
        raw: &[u8],
        filename: &str,
    ) -> Result<IngestResponse, DispatchError> {
        let span = tracing::info_span!(
            "ingest",
            request_id = %Uuid::new_v4(),
            filename,
            bytes = raw.len()
        );

        async {
            let result = self.run(raw, filename).await;
            match &result {
                Ok(response) => tracing::info!(
                    stage = %IngestStage::Completed,
                    format = %response.metadata.format,
                    intent = %response.metadata.intent,
                    action_status = ?response.action.status,
                    "Ingest request completed"
                ),
                Err(e) => tracing::warn!(
                    stage = %IngestStage::Failed,
                    reached = %e.reached_stage(),
                    error = %e,
                    "Ingest request failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, raw: &[u8], filename: &str) -> Result<IngestResponse, DispatchError> {
        let metadata = self
            .classifier
            .classify(raw, filename)
            .await
            .map_err(|e| DispatchError::ClassificationFailed(format!("{:#}", e)))?;
        self.record(sources::CLASSIFIER, keys::METADATA, &metadata).await;
        trace_stage(IngestStage::Classified);

        let extractor = self
            .extractors
            .get(metadata.format)
            .ok_or(DispatchError::UnsupportedFormat {
                format: metadata.format,
            })?;

        let extraction = extractor
            .extract(raw, &metadata)
            .await
            .map_err(|e| DispatchError::ExtractionFailed {
                format: metadata.format,
                message: format!("{:#}", e),
            })?;
        self.record(&extraction.source, keys::EXTRACTION, &extraction.data)
            .await;
        trace_stage(IngestStage::Extracted);

        let suggestion = &extraction.action_suggestion;
        let outcome = self.router.decide_and_execute(suggestion).await;
        let record = ActionRecord {
            action: &suggestion.action,
            outcome: &outcome,
        };
        self.record(sources::ROUTER, keys::ACTION, &record).await;
        trace_stage(IngestStage::Routed);

        Ok(IngestResponse {
            metadata,
            extraction: extraction.data,
            action: outcome,
        })
    }

    /// Append to the event log; a failed write is a warning, never an error.
    async fn record<T: Serialize + Sync>(&self, source: &str, key: &str, value: &T) {
        if let Err(e) = self.memory.append_serialized(source, key, value).await {
            tracing::warn!(source, key, error = %e, "Event log write failed, continuing");
        }
    }
}

fn trace_stage(stage: IngestStage) {
    tracing::debug!(stage = %stage, "Ingest stage reached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Extractor;
    use crate::router::RetryPolicy;
    use crate::transport::{Transport, TransportError, TransportResponse};
    use async_trait::async_trait;
    use conduit_core::{
        ActionSuggestion, ClassificationResult, DocumentFormat, Extraction, OutcomeStatus,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn json_map(value: serde_json::Value) -> conduit_core::JsonMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test payloads are objects"),
        }
    }

    struct FixedClassifier(Option<DocumentFormat>);

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _raw: &[u8],
            _filename: &str,
        ) -> anyhow::Result<ClassificationResult> {
            match self.0 {
                Some(format) => Ok(ClassificationResult::new(format, "RFQ")),
                None => anyhow::bail!("model unavailable"),
            }
        }
    }

    struct FakeExtractor {
        source: &'static str,
        target: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(
            &self,
            raw: &[u8],
            metadata: &ClassificationResult,
        ) -> anyhow::Result<Extraction> {
            if self.fail {
                anyhow::bail!("corrupt document");
            }
            Ok(Extraction {
                source: self.source.to_string(),
                data: json_map(json!({
                    "length": raw.len(),
                    "intent": metadata.intent,
                })),
                action_suggestion: ActionSuggestion::new("escalate", self.target),
            })
        }
    }

    struct CountingTransport {
        status: u16,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn post_json(
            &self,
            _path: &str,
            _payload: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: self.status,
                body: r#"{"status":"success"}"#.to_string(),
            })
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        transport: Arc<CountingTransport>,
    }

    fn harness(format: Option<DocumentFormat>, target: &'static str, http_status: u16) -> Harness {
        harness_with(format, target, http_status, false)
    }

    fn harness_with(
        format: Option<DocumentFormat>,
        target: &'static str,
        http_status: u16,
        failing_extractor: bool,
    ) -> Harness {
        let extractor = |source| {
            Arc::new(FakeExtractor {
                source,
                target,
                fail: failing_extractor,
            })
        };
        let registry = ExtractorRegistry::new()
            .with(DocumentFormat::Email, extractor("email_agent"))
            .with(DocumentFormat::Json, extractor("json_agent"))
            .with(DocumentFormat::Pdf, extractor("pdf_agent"));

        let transport = Arc::new(CountingTransport {
            status: http_status,
            calls: AtomicUsize::new(0),
        });
        let policy = RetryPolicy {
            max_retries: 2,
            timeout: std::time::Duration::from_secs(10),
            backoff: std::time::Duration::ZERO,
        };
        let router = Arc::new(ActionRouter::new(transport.clone(), policy));

        Harness {
            dispatcher: Dispatcher::new(
                Arc::new(FixedClassifier(format)),
                registry,
                router,
                Arc::new(EventLog::in_memory()),
            ),
            transport,
        }
    }

    #[tokio::test]
    async fn test_supported_formats_complete() {
        for (format, source) in [
            (DocumentFormat::Email, "email_agent"),
            (DocumentFormat::Json, "json_agent"),
            (DocumentFormat::Pdf, "pdf_agent"),
        ] {
            let h = harness(Some(format), "crm", 200);
            let response = h.dispatcher.handle_ingest(b"payload", "doc").await.unwrap();

            assert_eq!(response.metadata.format, format);
            assert!(!response.extraction.is_empty());
            assert_eq!(response.action.status, OutcomeStatus::Success);

            let events = h.dispatcher.memory().read_all().await.unwrap();
            let trail: Vec<_> = events
                .iter()
                .map(|e| (e.source.as_str(), e.key.as_str()))
                .collect();
            assert_eq!(
                trail,
                vec![
                    ("classifier", "metadata"),
                    (source, "extraction"),
                    ("router", "action"),
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_format_is_rejected_before_extraction() {
        let h = harness(Some(DocumentFormat::Unknown), "crm", 200);
        let err = h.dispatcher.handle_ingest(b"???", "blob.bin").await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::UnsupportedFormat {
                format: DocumentFormat::Unknown
            }
        ));
        let memory = h.dispatcher.memory();
        assert_eq!(memory.read_by_key("metadata").await.unwrap().len(), 1);
        assert!(memory.read_by_key("extraction").await.unwrap().is_empty());
        assert!(memory.read_by_key("action").await.unwrap().is_empty());
        assert_eq!(h.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unregistered_format_is_unsupported() {
        let transport = Arc::new(CountingTransport {
            status: 200,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(
            Arc::new(FixedClassifier(Some(DocumentFormat::Pdf))),
            ExtractorRegistry::new(),
            Arc::new(ActionRouter::new(transport, RetryPolicy::default())),
            Arc::new(EventLog::in_memory()),
        );

        let err = dispatcher.handle_ingest(b"%PDF-1.4", "a.pdf").await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_classifier_failure_aborts() {
        let h = harness(None, "crm", 200);
        let err = h.dispatcher.handle_ingest(b"x", "x").await.unwrap_err();

        assert!(matches!(err, DispatchError::ClassificationFailed(ref m) if m.contains("model unavailable")));
        assert!(h.dispatcher.memory().read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_writes_no_extraction_event() {
        let h = harness_with(Some(DocumentFormat::Json), "crm", 200, true);
        let err = h.dispatcher.handle_ingest(b"{}", "a.json").await.unwrap_err();

        assert!(matches!(err, DispatchError::ExtractionFailed { .. }));
        assert_eq!(err.failed_step(), "extraction");
        let events = h.dispatcher.memory().read_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "metadata");
        assert_eq!(h.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_routing_failure_still_completes() {
        let h = harness(Some(DocumentFormat::Email), "crm", 503);
        let response = h.dispatcher.handle_ingest(b"Subject: hi", "a.eml").await.unwrap();

        assert_eq!(response.action.status, OutcomeStatus::Error);
        assert_eq!(response.action.http_status, Some(503));
        assert_eq!(h.transport.calls.load(Ordering::SeqCst), 3);

        let actions = h.dispatcher.memory().read_by_key("action").await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].value["status"], "error");
    }

    #[tokio::test]
    async fn test_unknown_target_still_completes() {
        let h = harness(Some(DocumentFormat::Json), "bogus", 200);
        let response = h.dispatcher.handle_ingest(b"{}", "a.json").await.unwrap();

        assert_eq!(response.action.status, OutcomeStatus::Error);
        assert_eq!(response.action.error.as_deref(), Some("Unknown target: bogus"));
        assert_eq!(h.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_action_event_carries_the_verb() {
        let h = harness(Some(DocumentFormat::Json), "database", 200);
        h.dispatcher.handle_ingest(b"{}", "a.json").await.unwrap();

        let actions = h.dispatcher.memory().read_by_key("action").await.unwrap();
        assert_eq!(actions[0].source, "router");
        assert_eq!(actions[0].value["action"], "escalate");
        assert_eq!(actions[0].value["target"], "database");
        assert_eq!(actions[0].value["status"], "success");
    }

    #[tokio::test]
    async fn test_log_write_failure_does_not_fail_request() {
        let h = harness(Some(DocumentFormat::Json), "database", 200);
        h.dispatcher.memory().close().await;

        let response = h.dispatcher.handle_ingest(b"{}", "a.json").await.unwrap();
        assert!(response.action.is_success());
        assert!(h.dispatcher.memory().read_all().await.unwrap().is_empty());
    }

    /// Echoes the payload into the intent so each request's events can be
    /// told apart.
    struct EchoClassifier;

    #[async_trait]
    impl Classifier for EchoClassifier {
        async fn classify(
            &self,
            raw: &[u8],
            _filename: &str,
        ) -> anyhow::Result<ClassificationResult> {
            tokio::task::yield_now().await;
            Ok(ClassificationResult::new(
                DocumentFormat::Json,
                String::from_utf8_lossy(raw),
            ))
        }
    }

    struct EchoExtractor;

    #[async_trait]
    impl Extractor for EchoExtractor {
        async fn extract(
            &self,
            raw: &[u8],
            _metadata: &ClassificationResult,
        ) -> anyhow::Result<Extraction> {
            let doc = String::from_utf8_lossy(raw).into_owned();
            for _ in 0..raw.last().copied().unwrap_or_default() % 3 {
                tokio::task::yield_now().await;
            }
            Ok(Extraction {
                source: "json_agent".to_string(),
                data: json_map(json!({ "doc": doc })),
                action_suggestion: ActionSuggestion::new(format!("escalate-{}", doc), "crm"),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_keep_their_trails_in_order() {
        const REQUESTS: usize = 8;

        let transport = Arc::new(CountingTransport {
            status: 200,
            calls: AtomicUsize::new(0),
        });
        let router = Arc::new(ActionRouter::new(transport.clone(), RetryPolicy::default()));
        let memory = Arc::new(EventLog::in_memory());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(EchoClassifier),
            ExtractorRegistry::new().with(DocumentFormat::Json, Arc::new(EchoExtractor)),
            router,
            memory.clone(),
        ));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..REQUESTS {
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move {
                let doc = format!("doc-{}", i);
                dispatcher.handle_ingest(doc.as_bytes(), "doc.json").await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.unwrap().unwrap().action.is_success());
        }

        let events = memory.read_all().await.unwrap();
        assert_eq!(events.len(), 3 * REQUESTS);
        assert_eq!(transport.calls.load(Ordering::SeqCst), REQUESTS);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        for i in 0..REQUESTS {
            let doc = format!("doc-{}", i);
            let verb = format!("escalate-{}", doc);
            let position = |key: &str, field: &str, expected: &str| {
                events
                    .iter()
                    .position(|e| e.key == key && e.value[field] == expected)
                    .unwrap_or_else(|| panic!("no {} event for {}", key, doc))
            };

            let metadata = position("metadata", "intent", &doc);
            let extraction = position("extraction", "doc", &doc);
            let action = position("action", "action", &verb);
            assert!(
                metadata < extraction && extraction < action,
                "{} events out of order: {} {} {}",
                doc,
                metadata,
                extraction,
                action
            );
        }
    }
}
