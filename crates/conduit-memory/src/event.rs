//! Event types.
//!
//! An [`Event`] is one immutable entry in the log: who produced it
//! (`source`), what kind of step it records (`key`), and an opaque JSON
//! object payload (`value`).

use chrono::{DateTime, Utc};
use conduit_core::JsonMap;
use serde::{Deserialize, Serialize};

/// Well-known event sources.
pub mod sources {
    pub const CLASSIFIER: &str = "classifier";
    pub const ROUTER: &str = "router";
}

/// Well-known event keys.
pub mod keys {
    pub const METADATA: &str = "metadata";
    pub const EXTRACTION: &str = "extraction";
    pub const ACTION: &str = "action";
}

/// A single entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// Producer, e.g. "classifier", "email_agent", "router".
    pub source: String,

    /// Category tag, e.g. "metadata", "extraction", "action".
    pub key: String,

    /// Step-specific payload.
    pub value: JsonMap,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(source: impl Into<String>, key: impl Into<String>, value: JsonMap) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            key: key.into(),
            value,
        }
    }

    /// The `action` field of the payload, when it is a string.
    pub fn action(&self) -> Option<&str> {
        self.value.get("action").and_then(|v| v.as_str())
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] source/key {payload}`
    pub fn to_log_line(&self) -> String {
        let payload = serde_json::Value::Object(self.value.clone()).to_string();
        // Long payloads (full PDF text) are cut for console output
        let preview = if payload.chars().count() > 160 {
            let cut: String = payload.chars().take(160).collect();
            format!("{}...", cut)
        } else {
            payload
        };

        format!(
            "[{}] {}/{} {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.source,
            self.key,
            preview.replace('\n', " "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_event_action_field() {
        let event = Event::new(
            sources::ROUTER,
            keys::ACTION,
            payload(json!({ "action": "escalate", "status": "success" })),
        );
        assert_eq!(event.action(), Some("escalate"));

        let event = Event::new("json_agent", keys::EXTRACTION, payload(json!({ "valid": true })));
        assert_eq!(event.action(), None);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::new("classifier", "metadata", payload(json!({ "format": "JSON" })));
        let value = serde_json::to_value(&event).unwrap();

        assert!(value["timestamp"].is_string());
        assert_eq!(value["source"], "classifier");
        assert_eq!(value["key"], "metadata");
        assert_eq!(value["value"]["format"], "JSON");
    }

    #[test]
    fn test_to_log_line() {
        let event = Event::new(
            "email_agent",
            "extraction",
            payload(json!({ "subject": "Urgent complaint #1" })),
        );
        let line = event.to_log_line();
        assert!(line.contains("email_agent/extraction"));
        assert!(line.contains("Urgent complaint #1"));
    }

    #[test]
    fn test_to_log_line_truncates_long_payloads() {
        let text = "x".repeat(1000);
        let event = Event::new("pdf_agent", "extraction", payload(json!({ "full_text": text })));
        let line = event.to_log_line();
        assert!(line.ends_with("..."));
        assert!(line.len() < 300);
    }
}
