//! Outbound webhook delivery (C9): signed POST, retry with jittered
//! backoff, per-endpoint circuit breaker, bounded concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryProfile};

use super::signing;
use super::stats::running_average;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

/// Delivers event payloads to each agent's registered endpoint. One
/// `CircuitBreaker` per agent id, created lazily on first delivery attempt.
pub struct WebhookDispatcher {
    client: Client,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    semaphore: Arc<Semaphore>,
}

impl WebhookDispatcher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            breakers: RwLock::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    fn breaker_for(&self, agent_id: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(agent_id) {
            return breaker.clone();
        }
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        self.breakers.write().insert(agent_id.to_string(), breaker.clone());
        breaker
    }

    /// Current breaker state for `agent_id`'s webhook endpoint, or `None` if
    /// no delivery has ever been attempted for it.
    pub fn breaker_state(&self, agent_id: &str) -> Option<CircuitState> {
        self.breakers.read().get(agent_id).map(|b| b.state())
    }

    /// Forces `agent_id`'s circuit open (spec.md §4.9 `trip()`). Creates the
    /// breaker lazily so an operator can pre-emptively trip an endpoint that
    /// has never been delivered to yet.
    pub fn trip_breaker(&self, agent_id: &str) {
        self.breaker_for(agent_id).trip();
    }

    /// Forces `agent_id`'s circuit closed and clears its counters (spec.md
    /// §4.9 `reset()`).
    pub fn reset_breaker(&self, agent_id: &str) {
        self.breaker_for(agent_id).reset();
    }

    /// Delivers `payload` to `webhook_url`, signing it with `webhook_secret`.
    /// `prior_avg_ms`/`prior_success_count` seed the running-average update.
    pub async fn deliver(
        &self,
        agent_id: &str,
        webhook_url: &str,
        webhook_secret: &str,
        payload: &Value,
        prior_avg_ms: Option<u64>,
        prior_success_count: u64,
    ) -> DeliveryOutcome {
        let breaker = self.breaker_for(agent_id);
        if let Err(open) = breaker.allow_request() {
            return DeliveryOutcome {
                success: false,
                response_time_ms: None,
                error: Some(format!("circuit open, retry in {}ms", open.ms_until_retry)),
            };
        }

        let _permit = self.semaphore.acquire().await;
        let body = serde_json::to_vec(payload).unwrap_or_default();
        let signature = signing::sign(&body, webhook_secret);

        let profile = RetryProfile::WEBHOOK;
        let mut attempt = 0;
        let started = Instant::now();

        loop {
            match self.attempt_once(webhook_url, &body, &signature).await {
                Ok(()) => {
                    breaker.record_success();
                    let sample_ms = started.elapsed().as_millis() as u64;
                    return DeliveryOutcome {
                        success: true,
                        response_time_ms: Some(running_average(prior_avg_ms, sample_ms, prior_success_count)),
                        error: None,
                    };
                }
                Err(AttemptError::Fatal(message)) => {
                    breaker.record_failure();
                    return DeliveryOutcome { success: false, response_time_ms: None, error: Some(message) };
                }
                Err(AttemptError::Retryable(message)) => {
                    if attempt >= profile.max_retries {
                        breaker.record_failure();
                        return DeliveryOutcome { success: false, response_time_ms: None, error: Some(message) };
                    }
                    tokio::time::sleep(profile.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_once(&self, url: &str, body: &[u8], signature: &str) -> Result<(), AttemptError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-WSS-Signature", signature)
            .body(body.to_vec())
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    Ok(())
                } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    Err(AttemptError::Retryable(format!("http {status}")))
                } else {
                    Err(AttemptError::Fatal(format!("http {status}")))
                }
            }
            Err(err) => {
                warn!(error = %err, url, "webhook delivery attempt failed");
                Err(AttemptError::Retryable(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_for_is_stable_per_agent() {
        let dispatcher = WebhookDispatcher::new(4);
        let a = dispatcher.breaker_for("agent-1");
        let b = dispatcher.breaker_for("agent-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_agents_get_different_breakers() {
        let dispatcher = WebhookDispatcher::new(4);
        let a = dispatcher.breaker_for("agent-1");
        let b = dispatcher.breaker_for("agent-2");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn trip_breaker_creates_and_opens_a_breaker_with_no_prior_deliveries() {
        let dispatcher = WebhookDispatcher::new(4);
        assert_eq!(dispatcher.breaker_state("agent-1"), None);
        dispatcher.trip_breaker("agent-1");
        assert_eq!(dispatcher.breaker_state("agent-1"), Some(CircuitState::Open));
    }

    #[test]
    fn reset_breaker_closes_a_tripped_breaker() {
        let dispatcher = WebhookDispatcher::new(4);
        dispatcher.trip_breaker("agent-1");
        dispatcher.reset_breaker("agent-1");
        assert_eq!(dispatcher.breaker_state("agent-1"), Some(CircuitState::Closed));
    }
}
