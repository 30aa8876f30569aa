//! Action suggestions and the outcomes of carrying them out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verb + destination pair produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSuggestion {
    /// Human-readable verb, e.g. "escalate". Only logged by the router.
    pub action: String,
    /// Logical destination name, e.g. "crm".
    pub target: String,
}

impl ActionSuggestion {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
        }
    }

    /// Resolve the target string into a routing target.
    pub fn target(&self) -> Target {
        Target::parse(&self.target)
    }
}

/// Logical destination of an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Delivered to `/crm`.
    Crm,
    /// Delivered to `/risk_alert`.
    RiskAlert,
    /// Acknowledged locally; no network call.
    Database,
    /// Anything the router does not know.
    Other(String),
}

impl Target {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "crm" => Self::Crm,
            "risk_alert" => Self::RiskAlert,
            "database" => Self::Database,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Crm => "crm",
            Self::RiskAlert => "risk_alert",
            Self::Database => "database",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Recorded result of executing an [`ActionSuggestion`].
///
/// `status` is `Success` only when no network call was needed or the last
/// attempt returned a non-error status with a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,
    /// Target name without a leading slash.
    pub target: String,
    /// Status code of the last attempt, absent when nothing was sent.
    pub http_status: Option<u16>,
    pub response_body: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn success(
        target: impl Into<String>,
        http_status: Option<u16>,
        response_body: Option<serde_json::Value>,
    ) -> Self {
        Self {
            status: OutcomeStatus::Success,
            target: normalize_target(target.into()),
            http_status,
            response_body,
            error: None,
        }
    }

    pub fn failure(
        target: impl Into<String>,
        http_status: Option<u16>,
        response_body: Option<serde_json::Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: OutcomeStatus::Error,
            target: normalize_target(target.into()),
            http_status,
            response_body,
            error: Some(error.into()),
        }
    }

    /// Local acknowledgement for the `database` target.
    pub fn archived() -> Self {
        Self::success(
            Target::Database.as_str(),
            None,
            Some(serde_json::json!({ "message": "Archived to database." })),
        )
    }

    pub fn unknown_target(target: &str) -> Self {
        Self::failure(target, None, None, format!("Unknown target: {}", target))
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

fn normalize_target(target: String) -> String {
    match target.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse("crm"), Target::Crm);
        assert_eq!(Target::parse("risk_alert"), Target::RiskAlert);
        assert_eq!(Target::parse("database"), Target::Database);
        assert_eq!(Target::parse("CRM"), Target::Other("CRM".to_string()));
    }

    #[test]
    fn test_outcome_target_is_path_normalized() {
        let outcome = ActionOutcome::success("/risk_alert", Some(200), None);
        assert_eq!(outcome.target, "risk_alert");
        assert!(outcome.is_success());
    }

    #[test]
    fn test_unknown_target_outcome() {
        let outcome = ActionOutcome::unknown_target("bogus");
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.error.as_deref(), Some("Unknown target: bogus"));
        assert_eq!(outcome.http_status, None);
    }

    #[test]
    fn test_outcome_serializes_absent_fields_as_null() {
        let value = serde_json::to_value(ActionOutcome::archived()).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["target"], "database");
        assert!(value["http_status"].is_null());
        assert!(value["error"].is_null());
    }
}
