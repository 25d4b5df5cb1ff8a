// kousei-core/src/redaction.rs
//! Data structures for sensitive spans found by the guards, and helpers that keep raw
//! sensitive text out of log output.
//!
//! Nothing sensitive is ever logged verbatim unless `KOUSEI_ALLOW_DEBUG_PII=true` is set
//! in the environment; otherwise a length marker or a SHA-256 fingerprint is logged.

use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::issue::TextRange;

lazy_static! {
    /// Read once: whether raw PII may appear in debug logs.
    static ref PII_DEBUG_ALLOWED: bool = {
        std::env::var("KOUSEI_ALLOW_DEBUG_PII")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// One sensitive span detected in raw text.
///
/// Used for both PII (masked and passed on) and secrets (the request is rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveMatch {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub masked_value: String,
    pub range: TextRange,
}

pub type PiiMatch = SensitiveMatch;
pub type SecretMatch = SensitiveMatch;

pub fn redact_sensitive(s: &str) -> String {
    const MAX_LEN: usize = 8;
    let len = s.chars().count();
    if len <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {} chars]", len)
    }
}

/// Short stable fingerprint of a sensitive value, safe to log and compare.
pub fn fingerprint(kind: &str, value: &str) -> String {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

pub fn loggable(sensitive_content: &str) -> String {
    if *PII_DEBUG_ALLOWED {
        sensitive_content.to_string()
    } else {
        redact_sensitive(sensitive_content)
    }
}

pub fn log_sensitive_match_debug(module_path: &str, m: &SensitiveMatch) {
    debug!(
        "{} Sensitive span: type='{}', range={}, value='{}', fingerprint={}",
        module_path,
        m.kind,
        m.range,
        loggable(&m.value),
        fingerprint(&m.kind, &m.value)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_sensitive_counts_chars() {
        assert_eq!(redact_sensitive("山田"), "[REDACTED]");
        assert_eq!(redact_sensitive("東京都千代田区丸の内一丁目"), "[REDACTED: 13 chars]");
    }

    #[test]
    fn test_fingerprint_is_stable_and_kind_scoped() {
        let a = fingerprint("email", "a@example.com ");
        assert_eq!(a, fingerprint("email", "a@example.com"));
        assert_ne!(a, fingerprint("phone", "a@example.com"));
        assert_eq!(a.len(), 16);
    }
}
