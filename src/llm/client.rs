//! Dispatch of completion requests under rate limiting and bounded retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::{ApiConfig, RetryConfig};

use super::error::{ApiError, TransportError};
use super::limiter::RateLimiter;
use super::types::CompletionRequest;

/// A single dispatch attempt against the upstream. The seam exists so the
/// retry machine can be driven without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dispatch(&self, request: &CompletionRequest)
    -> Result<serde_json::Value, TransportError>;
}

// ============================================================================
// HttpTransport
// ============================================================================

/// Reqwest-backed transport posting to `{base_url}/chat/completions` with
/// bearer authentication.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(
        &self,
        request: &CompletionRequest,
    ) -> Result<serde_json::Value, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Connect(format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status,
                message,
                retry_after,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Connect(format!("failed to read response body: {e}")))
    }
}

// ============================================================================
// ApiClient
// ============================================================================

/// Per-call dispatch states. Terminal outcomes (success, rejection,
/// exhaustion, rate-limit refusal) leave the machine by returning.
#[derive(Debug)]
enum SendState {
    Pending { attempt: u32 },
    RetryScheduled { attempt: u32, delay: Duration },
}

/// Sends completion requests, enforcing the shared rate limit and retrying
/// transient failures with capped exponential backoff.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>, retry: RetryConfig) -> Self {
        Self {
            transport,
            limiter,
            retry,
        }
    }

    /// An HTTP-backed client.
    pub fn http(api: &ApiConfig, limiter: Arc<RateLimiter>, retry: RetryConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new(api)), limiter, retry)
    }

    /// Dispatch a request, returning the raw upstream result.
    ///
    /// Every attempt takes its own rate-limit permit, so retries count
    /// against the window like first sends do. Cancelling the returned
    /// future between permit acquisition and dispatch releases the slot.
    pub async fn send(&self, request: &CompletionRequest) -> Result<serde_json::Value, ApiError> {
        let mut state = SendState::Pending { attempt: 1 };
        loop {
            state = match state {
                SendState::Pending { attempt } => {
                    let permit = self.limiter.acquire().await?;
                    match self.transport.dispatch(request).await {
                        Ok(raw) => {
                            permit.commit();
                            debug!(attempt, "dispatch succeeded");
                            return Ok(raw);
                        }
                        Err(err) => {
                            if err.was_dispatched() {
                                permit.commit();
                            }
                            if !err.is_transient() {
                                let (status, message) = match err {
                                    TransportError::Status { status, message, .. } => {
                                        (status, message)
                                    }
                                    other => (0, other.to_string()),
                                };
                                return Err(ApiError::RequestRejected { status, message });
                            }
                            if attempt >= self.retry.max_attempts {
                                return Err(ApiError::UpstreamUnavailable {
                                    attempts: attempt,
                                    last_error: err.to_string(),
                                });
                            }
                            let delay = backoff_delay(&self.retry, attempt, err.retry_after());
                            warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "transient upstream failure, retrying"
                            );
                            SendState::RetryScheduled { attempt, delay }
                        }
                    }
                }
                SendState::RetryScheduled { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    SendState::Pending {
                        attempt: attempt + 1,
                    }
                }
            };
        }
    }
}

/// Exponential backoff with additive jitter, capped, overridden by a larger
/// server-provided `Retry-After`.
fn backoff_delay(retry: &RetryConfig, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let shift = (attempt - 1).min(16);
    let exponential = retry
        .base_delay_ms
        .saturating_mul(1u64 << shift)
        .min(retry.max_delay_ms);
    let jitter = if exponential >= 2 {
        rand::rng().random_range(0..=exponential / 2)
    } else {
        0
    };
    let server_floor = retry_after_secs.map(|s| s.saturating_mul(1000)).unwrap_or(0);
    Duration::from_millis((exponential + jitter).max(server_floor))
}

// ============================================================================
// Tests
// ============================================================================
