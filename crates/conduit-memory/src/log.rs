//! Event log implementation.
//!
//! Provides the main [`EventLog`] type: append-only writes plus the
//! filtered reads used by audit queries.

use conduit_core::{JsonMap, MemoryConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::error::MemoryError;
use crate::event::Event;
use crate::storage::{EventStorage, MemoryStorage, create_storage};

/// The append-only event log shared by every in-flight request.
pub struct EventLog {
    storage: Arc<dyn EventStorage>,
}

impl EventLog {
    /// Create a log over the backend selected by configuration.
    pub fn from_config(config: &MemoryConfig) -> Result<Self, MemoryError> {
        Ok(Self {
            storage: create_storage(config)?,
        })
    }

    /// Create a log with a custom storage backend.
    pub fn with_storage(storage: Arc<dyn EventStorage>) -> Self {
        Self { storage }
    }

    /// Create an in-process log (useful for tests and one-shot runs).
    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    /// Append an event stamped with the current time.
    ///
    /// Callers on the request path are expected to downgrade an error here
    /// to a warning; a missing log entry never blocks a response.
    pub async fn append(
        &self,
        source: &str,
        key: &str,
        value: JsonMap,
    ) -> Result<Event, MemoryError> {
        let event = self.storage.store(Event::new(source, key, value)).await?;

        tracing::debug!(
            source = %event.source,
            key = %event.key,
            timestamp = %event.timestamp,
            "Event appended"
        );

        Ok(event)
    }

    /// Append any serializable value that serializes to a JSON object.
    pub async fn append_serialized<T: Serialize>(
        &self,
        source: &str,
        key: &str,
        value: &T,
    ) -> Result<Event, MemoryError> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => self.append(source, key, map).await,
            other => Err(MemoryError::NotAnObject(json_kind(&other))),
        }
    }

    /// Query events with filters, in append order.
    pub async fn query(&self, filter: EventFilter) -> Result<Vec<Event>, MemoryError> {
        self.storage.query(&filter).await
    }

    /// All events, oldest first.
    pub async fn read_all(&self) -> Result<Vec<Event>, MemoryError> {
        self.query(EventFilter::default()).await
    }

    /// Events whose `source` matches exactly.
    pub async fn read_by_source(&self, source: &str) -> Result<Vec<Event>, MemoryError> {
        self.query(EventFilter {
            source: Some(source.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Events whose `key` matches exactly.
    pub async fn read_by_key(&self, key: &str) -> Result<Vec<Event>, MemoryError> {
        self.query(EventFilter {
            key: Some(key.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Release the underlying storage. Idempotent; errors are swallowed.
    pub async fn close(&self) {
        if let Err(e) = self.storage.close().await {
            tracing::debug!(error = %e, "Ignoring error while closing event log");
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Filter for querying events. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Exact match on `source`.
    pub source: Option<String>,
    /// Exact match on `key`.
    pub key: Option<String>,
    /// Exact match on the payload's `action` field.
    pub action: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl EventFilter {
    /// Whether an event passes the field predicates (limit/offset aside).
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref source) = self.source {
            if &event.source != source {
                return false;
            }
        }
        if let Some(ref key) = self.key {
            if &event.key != key {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if event.action() != Some(action.as_str()) {
                return false;
            }
        }
        true
    }
}
