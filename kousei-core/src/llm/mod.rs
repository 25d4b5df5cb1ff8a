//! The external LLM collaborator.
//!
//! The rest of the crate talks to a model only through the [`LlmClient`] trait, so tests
//! substitute fakes and callers can wrap a client in [`retry::RetryingClient`]. The
//! concrete [`http::HttpLlmClient`] speaks the OpenAI-compatible chat completions API.
//!
//! License: MIT OR APACHE 2.0

pub mod cancel;
pub mod extract;
pub mod health;
pub mod http;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use cancel::CancellationToken;
pub use health::HealthMonitor;
pub use http::HttpLlmClient;
pub use retry::{RetryPolicy, RetryingClient};

/// Transport-level failures of an LLM call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM rate limit hit")]
    RateLimit { retry_after: Option<Duration> },

    #[error("LLM authentication failed: {0}")]
    Auth(String),

    #[error("LLM network error: {0}")]
    Network(String),

    #[error("Could not parse LLM response: {0}")]
    Parse(String),

    #[error("LLM backend unavailable: {0}")]
    Unavailable(String),

    #[error("LLM request was cancelled")]
    Cancelled,
}

impl LlmError {
    /// Timeouts, rate limits and network faults are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout(_) | LlmError::RateLimit { .. } | LlmError::Network(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// One completion request. `prompt` is already guarded and wrapped in delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub prompt: String,
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
    pub elapsed: Duration,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Cheap reachability probe. Defaults to always healthy.
    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        (**self).health_check().await
    }
}
