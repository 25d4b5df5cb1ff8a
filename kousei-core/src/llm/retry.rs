//! retry.rs - Exponential backoff around any [`LlmClient`].
//!
//! License: MIT OR APACHE 2.0

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};

/// Backoff settings. Stored in milliseconds so the policy can live in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Adds up to 25% random extra delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1`, capped at `max_delay_ms` before jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);
        let delay = if self.jitter {
            capped + rand::random::<f64>() * 0.25 * capped
        } else {
            capped
        };
        Duration::from_micros((delay.max(0.0) * 1000.0).round() as u64)
    }
}

/// Retries retryable failures of the wrapped client. Rate-limit hints from the server
/// take precedence over the computed backoff.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: LlmClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RetryingClient<C> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!("LLM call succeeded after {} retr(y/ies).", attempt);
                    }
                    return Ok(response);
                }
                Err(err) if !err.is_retryable() || attempt >= self.policy.max_retries => {
                    if attempt > 0 {
                        warn!("LLM call failed after {} attempt(s): {}", attempt + 1, err);
                    }
                    return Err(err);
                }
                Err(err) => {
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));
                    debug!(
                        "LLM attempt {} failed ({}); retrying in {:?}.",
                        attempt + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        self.inner.health_check().await
    }
}
