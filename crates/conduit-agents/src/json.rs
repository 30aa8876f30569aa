//! JSON extractor: parses the payload and validates it as an order.

use async_trait::async_trait;
use conduit_core::{ActionSuggestion, ClassificationResult, Extraction, JsonMap};
use conduit_runtime::Extractor;
use jsonschema::Validator;
use serde_json::{Value, json};
use std::sync::LazyLock;

pub const SOURCE: &str = "json_agent";

/// Order payload accepted without an alert. Extra fields are allowed.
static ORDER_SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    let schema = json!({
        "type": "object",
        "required": ["order_id", "product", "quantity", "price"],
        "properties": {
            "order_id": { "type": "string" },
            "product": { "type": "string" },
            "quantity": { "type": "integer" },
            "price": { "type": "number" }
        }
    });
    jsonschema::validator_for(&schema).expect("order schema compiles")
});

#[derive(Debug, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for JsonExtractor {
    async fn extract(
        &self,
        raw: &[u8],
        _metadata: &ClassificationResult,
    ) -> anyhow::Result<Extraction> {
        // A payload that does not parse is reported in the data, not raised
        let (parsed, errors) = match serde_json::from_slice::<Value>(raw) {
            Ok(parsed) => {
                let errors = validate_order(&parsed);
                (parsed, errors)
            }
            Err(e) => (Value::Null, vec![format!("JSONParseError: {}", e)]),
        };

        let valid = errors.is_empty();
        if !valid {
            tracing::debug!(errors = ?errors, "JSON payload failed order validation");
        }

        let mut data = JsonMap::new();
        data.insert("parsed_json".to_string(), parsed);
        data.insert("valid".to_string(), json!(valid));
        data.insert("errors".to_string(), json!(errors));

        let action_suggestion = if valid {
            ActionSuggestion::new("store", "database")
        } else {
            ActionSuggestion::new("alert", "risk_alert")
        };

        Ok(Extraction {
            source: SOURCE.to_string(),
            data,
            action_suggestion,
        })
    }
}

/// Schema violations of `value`, each prefixed with the offending field.
fn validate_order(value: &Value) -> Vec<String> {
    ORDER_SCHEMA
        .iter_errors(value)
        .map(|error| {
            let path = error.instance_path().to_string();
            match path.trim_start_matches('/') {
                "" => error.to_string(),
                field => format!("{}: {}", field, error),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::DocumentFormat;

    async fn extract(raw: &str) -> Extraction {
        JsonExtractor::new()
            .extract(
                raw.as_bytes(),
                &ClassificationResult::new(DocumentFormat::Json, "RFQ"),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_order_is_stored() {
        let extraction = extract(
            r#"{"order_id": "A-1", "product": "Widget A", "quantity": 100, "price": 2.5, "note": "rush"}"#,
        )
        .await;

        assert_eq!(extraction.source, "json_agent");
        assert_eq!(extraction.data["valid"], true);
        assert_eq!(extraction.data["errors"], json!([]));
        assert_eq!(extraction.data["parsed_json"]["note"], "rush");
        assert_eq!(extraction.action_suggestion, ActionSuggestion::new("store", "database"));
    }

    #[tokio::test]
    async fn test_invalid_order_alerts() {
        let extraction = extract(r#"{"product": "Widget A", "quantity": 1.5, "price": "ten"}"#).await;

        assert_eq!(extraction.data["valid"], false);
        let errors: Vec<&str> = extraction.data["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e.as_str().unwrap())
            .collect();
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors.iter().any(|e| e.contains("order_id") && e.contains("required")));
        assert!(errors.iter().any(|e| e.starts_with("quantity:") && e.contains("integer")));
        assert!(errors.iter().any(|e| e.starts_with("price:") && e.contains("number")));
        assert_eq!(extraction.action_suggestion, ActionSuggestion::new("alert", "risk_alert"));
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_reported_in_data() {
        let extraction = extract("{not json").await;

        assert!(extraction.data["parsed_json"].is_null());
        assert_eq!(extraction.data["valid"], false);
        let errors = extraction.data["errors"].as_array().unwrap();
        assert!(errors[0].as_str().unwrap().starts_with("JSONParseError"));
        assert_eq!(extraction.action_suggestion.target, "risk_alert");
    }

    #[tokio::test]
    async fn test_non_object_payload() {
        let extraction = extract("[1, 2, 3]").await;
        let errors = extraction.data["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].as_str().unwrap().contains("object"));
        assert_eq!(extraction.action_suggestion.target, "risk_alert");
    }
}
