//! errors.rs - Custom error types for the kousei-core library.
//!
//! This module defines a structured error enum for the library. Each variant maps onto
//! one stable error code (see [`KouseiError::code`]) so that callers on the other side of
//! a process or language boundary can branch on the failure kind without parsing messages.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

use crate::llm::LlmError;

/// This enum represents all possible error types in the `kousei-core` library.
///
/// By using `#[non_exhaustive]`, we signal to consumers of this library that
/// new variants may be added in future versions.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KouseiError {
    #[error("Failed to compile rule '{0}': {1}")]
    RuleCompile(String, String),

    #[error("Rule '{0}': pattern length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Analysis time budget of {0} ms exceeded; remaining rules were skipped")]
    TimeoutExceeded(u64),

    #[error("Text contains credentials ({}); the request was not sent", .0.join(", "))]
    SecretDetected(Vec<String>),

    #[error("Prompt injection patterns detected: {}", .0.join(", "))]
    PromptThreatDetected(Vec<String>),

    #[error("LLM response failed schema validation: {0}")]
    SchemaValidation(String),

    #[error("Issue '{0}' no longer matches the current text")]
    StaleRange(String),

    #[error("Issue '{0}' is preview-only and cannot be applied directly")]
    NotApplicable(String),

    #[error("Invalid range {start}..{end} for text of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("Issue '{0}' not found")]
    IssueNotFound(String),

    #[error("Issue '{0}' has no suggestion at index {1}")]
    SuggestionNotFound(String, usize),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
}

impl KouseiError {
    /// Returns the stable, upper-snake-case code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            KouseiError::RuleCompile(..) | KouseiError::PatternLengthExceeded(..) => "RULE_COMPILE_ERROR",
            KouseiError::TimeoutExceeded(_) => "TIMEOUT_EXCEEDED",
            KouseiError::SecretDetected(_) => "SECRET_DETECTED",
            KouseiError::PromptThreatDetected(_) => "PROMPT_THREAT_DETECTED",
            KouseiError::SchemaValidation(_) => "SCHEMA_VALIDATION_FAILURE",
            KouseiError::StaleRange(_) => "STALE_RANGE",
            KouseiError::NotApplicable(_) => "NOT_APPLICABLE",
            KouseiError::InvalidRange { .. } => "INVALID_RANGE",
            KouseiError::IssueNotFound(_) => "ISSUE_NOT_FOUND",
            KouseiError::SuggestionNotFound(..) => "SUGGESTION_NOT_FOUND",
            KouseiError::Llm(LlmError::Cancelled) => "CANCELLED",
            KouseiError::Llm(_) => "LLM_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(KouseiError::StaleRange("a".into()).code(), "STALE_RANGE");
        assert_eq!(KouseiError::NotApplicable("a".into()).code(), "NOT_APPLICABLE");
        assert_eq!(
            KouseiError::InvalidRange { start: 3, end: 1, len: 2 }.code(),
            "INVALID_RANGE"
        );
        assert_eq!(
            KouseiError::PatternLengthExceeded("r".into(), 600, 500).code(),
            "RULE_COMPILE_ERROR"
        );
        assert_eq!(KouseiError::Llm(LlmError::Cancelled).code(), "CANCELLED");
        assert_eq!(KouseiError::TimeoutExceeded(50).code(), "TIMEOUT_EXCEEDED");
        assert_eq!(KouseiError::PromptThreatDetected(Vec::new()).code(), "PROMPT_THREAT_DETECTED");
        assert_eq!(KouseiError::SchemaValidation("x".into()).code(), "SCHEMA_VALIDATION_FAILURE");
    }

    #[test]
    fn test_secret_detected_lists_kinds() {
        let err = KouseiError::SecretDetected(vec!["aws_access_key".into(), "credit_card".into()]);
        let msg = err.to_string();
        assert!(msg.contains("aws_access_key, credit_card"));
    }
}
