//! Action router.
//!
//! Maps an [`ActionSuggestion`] onto a side effect using a fixed table:
//!
//! | Target | Behavior |
//! |--------|----------|
//! | `crm` | POST `/crm` with retry |
//! | `risk_alert` | POST `/risk_alert` with retry |
//! | `database` | No network call; immediate success |
//! | anything else | Immediate error, no network call |
//!
//! Delivery is at most `max_retries + 1` attempts with a fixed pause between
//! them. There is no outbox or idempotency key; callers needing stronger
//! guarantees wrap the router.

use chrono::Utc;
use conduit_core::{ActionOutcome, ActionSuggestion, RouterConfig, Target};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{HttpTransport, Transport, TransportError};

/// Bounded retry settings for network-bound targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Fixed pause after a failed attempt (no growth, no jitter).
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(1),
        }
    }
}

impl From<&RouterConfig> for RetryPolicy {
    fn from(config: &RouterConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout: config.timeout(),
            backoff: config.backoff(),
        }
    }
}

pub struct ActionRouter {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ActionRouter {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Router over a reqwest transport pointed at `config.base_url`.
    pub fn from_config(config: &RouterConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config.base_url, config.timeout())?;
        Ok(Self::new(Arc::new(transport), RetryPolicy::from(config)))
    }

    /// Execute a suggestion and report what happened. Never fails: delivery
    /// problems are reported inside the outcome.
    pub async fn decide_and_execute(&self, suggestion: &ActionSuggestion) -> ActionOutcome {
        let target = suggestion.target();

        let path = match &target {
            Target::Crm => "/crm",
            Target::RiskAlert => "/risk_alert",
            Target::Database => {
                tracing::info!(action = %suggestion.action, "Database target acknowledged locally");
                return ActionOutcome::archived();
            }
            Target::Other(name) => {
                tracing::warn!(action = %suggestion.action, target = %name, "Unknown action target");
                return ActionOutcome::unknown_target(name);
            }
        };

        let payload = json!({
            "action": suggestion.action,
            "timestamp": Utc::now().to_rfc3339(),
        });

        self.post_with_retries(path, &payload, self.policy.max_retries)
            .await
    }

    /// POST `payload` to `path`, trying up to `max_retries + 1` times.
    ///
    /// An attempt succeeds when it completes within the timeout with a
    /// non-error status and a JSON body. Otherwise the failure is recorded
    /// and, if attempts remain, the router pauses for the backoff interval.
    pub async fn post_with_retries(
        &self,
        path: &str,
        payload: &serde_json::Value,
        max_retries: u32,
    ) -> ActionOutcome {
        let attempts = max_retries.saturating_add(1);
        let mut http_status = None;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result =
                tokio::time::timeout(self.policy.timeout, self.transport.post_json(path, payload))
                    .await;

            match result {
                Ok(Ok(resp)) => {
                    http_status = Some(resp.status);
                    if resp.is_success() {
                        match serde_json::from_str::<serde_json::Value>(&resp.body) {
                            Ok(body) => {
                                tracing::info!(path, attempt, status = resp.status, "Action delivered");
                                return ActionOutcome::success(path, http_status, Some(body));
                            }
                            Err(e) => {
                                last_error = format!("Invalid response body from {}: {}", path, e);
                            }
                        }
                    } else {
                        last_error = format!("HTTP {} from {}", resp.status, path);
                    }
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "Request to {} timed out after {}s",
                        path,
                        self.policy.timeout.as_secs_f64()
                    );
                }
            }

            tracing::warn!(
                path,
                attempt,
                attempts,
                error = %last_error,
                "Action delivery attempt failed"
            );

            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        ActionOutcome::failure(path, http_status, None, last_error)
    }

    /// Release the transport's connection pool. Drain in-flight requests first.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}
