//! http.rs - OpenAI-compatible chat completions client.
//!
//! License: MIT OR APACHE 2.0

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::config::LlmConfig;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(config.base_url.clone(), config.model.clone())
            .with_timeout(Duration::from_millis(config.timeout_ms));
        if let Some(key) = config.resolved_api_key() {
            client = client.with_api_key(key);
        }
        client
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Maps a non-success HTTP status onto the retry-aware error taxonomy.
fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let snippet: String = body.chars().take(200).collect();
    match status.as_u16() {
        401 | 403 => LlmError::Auth(format!("HTTP {}", status.as_u16())),
        429 => LlmError::RateLimit {
            retry_after: serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("retry_after").and_then(|r| r.as_f64()))
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64),
        },
        408 | 504 => LlmError::Timeout(Duration::ZERO),
        500..=599 => LlmError::Network(format!("HTTP {}: {}", status.as_u16(), snippet)),
        code => LlmError::Unavailable(format!("HTTP {}: {}", code, snippet)),
    }
}

fn map_transport_error(err: reqwest::Error, elapsed: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(elapsed)
    } else if err.is_connect() {
        LlmError::Network(format!("connection failed: {}", err))
    } else {
        LlmError::Network(format!("request failed: {}", err))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system_prompt },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: 0.2,
        };
        let started = Instant::now();
        let send = self
            .authorized(self.client.post(self.endpoint("chat/completions")))
            .json(&body)
            .send();

        let response = match tokio::time::timeout(self.timeout, send).await {
            Err(_) => return Err(LlmError::Timeout(started.elapsed())),
            Ok(Err(e)) => return Err(map_transport_error(e, started.elapsed())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("invalid completion body: {}", e)))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let elapsed = started.elapsed();
        debug!("LLM completion: {} chars in {:?}.", content.chars().count(), elapsed);
        Ok(LlmResponse { content, elapsed })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let probe = self.authorized(self.client.get(self.endpoint("models"))).send();
        match tokio::time::timeout(Duration::from_secs(5), probe).await {
            Err(_) => Err(LlmError::Timeout(Duration::from_secs(5))),
            Ok(Err(e)) => Err(map_transport_error(e, Duration::ZERO)),
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                Err(map_http_error(status, &text))
            }
        }
    }
}
