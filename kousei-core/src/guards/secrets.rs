//! secrets.rs - Fail-closed credential detection.
//!
//! Text that contains anything resembling a credential must never reach the LLM, not even
//! masked. [`SecretRejector::check`] returns `SECRET_DETECTED` on the first sign of one.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::errors::KouseiError;
use crate::issue::TextRange;
use crate::redaction::{log_sensitive_match_debug, SecretMatch};
use crate::validators::find_card_numbers;

lazy_static! {
    // No `\b` here: Japanese characters count as word characters, so a key embedded
    // directly in Japanese prose would never see a word boundary.
    static ref SIGNATURES: Vec<(&'static str, Regex)> = {
        let table: &[(&str, &str)] = &[
            ("aws_access_key", r"(?:AKIA|ASIA)[0-9A-Z]{16}"),
            ("anthropic_api_key", r"sk-ant-[A-Za-z0-9_\-]{20,}"),
            ("openai_api_key", r"sk-(?:proj-)?[A-Za-z0-9_\-]{20,}"),
            ("github_token", r"gh[pousr]_[A-Za-z0-9]{36,}"),
            ("github_pat", r"github_pat_[A-Za-z0-9_]{22,}"),
            ("google_api_key", r"AIza[0-9A-Za-z_\-]{35}"),
            ("slack_token", r"xox[abposr]-[A-Za-z0-9\-]{10,}"),
            ("stripe_key", r"(?:sk|rk)_(?:live|test)_[A-Za-z0-9]{16,}"),
            ("private_key", r"-----BEGIN (?:[A-Z0-9]+ )*PRIVATE KEY-----"),
            ("jwt", r"eyJ[A-Za-z0-9_\-]{8,}\.eyJ[A-Za-z0-9_\-]{8,}\.[A-Za-z0-9_\-]{8,}"),
            ("bearer_token", r"(?i)bearer\s+[A-Za-z0-9_\-.=]{20,}"),
            (
                "credential_assignment",
                r"(?i)(?:password|passwd|api[_\-]?key|secret[_\-]?key|access[_\-]?token|パスワード)\s*[:=：＝]\s*[^\s　、。]{6,}",
            ),
        ];
        table
            .iter()
            .filter_map(|(kind, pattern)| match Regex::new(pattern) {
                Ok(re) => Some((*kind, re)),
                Err(e) => {
                    warn!("Secret signature '{}' failed to compile: {}", kind, e);
                    None
                }
            })
            .collect()
    };
}

/// Detects credentials and Luhn-valid card numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretRejector;

impl SecretRejector {
    pub fn new() -> Self {
        Self
    }

    /// Lists every secret-looking span. Ranges may overlap across signatures.
    pub fn scan(&self, text: &str) -> Vec<SecretMatch> {
        let mut found = Vec::new();
        let mut push = |kind: &str, start: usize, end: usize| {
            let m = SecretMatch {
                kind: kind.to_string(),
                value: text[start..end].to_string(),
                masked_value: format!("[{}]", kind.to_ascii_uppercase()),
                range: TextRange::new(start, end),
            };
            log_sensitive_match_debug("[kousei_core::guards::secrets]", &m);
            found.push(m);
        };

        for (kind, regex) in SIGNATURES.iter() {
            for m in regex.find_iter(text) {
                push(kind, m.start(), m.end());
            }
        }

        for (start, end) in find_card_numbers(text) {
            push("credit_card", start, end);
        }
        found
    }

    pub fn contains_secret(&self, text: &str) -> bool {
        !self.scan(text).is_empty()
    }

    /// Fails with `SECRET_DETECTED` listing the distinct kinds found.
    pub fn check(&self, text: &str) -> Result<(), KouseiError> {
        let matches = self.scan(text);
        if matches.is_empty() {
            return Ok(());
        }
        let mut kinds: Vec<String> = Vec::new();
        for m in matches {
            if !kinds.contains(&m.kind) {
                kinds.push(m.kind);
            }
        }
        warn!("SECRET_DETECTED: refusing to forward text containing {}", kinds.join(", "));
        Err(KouseiError::SecretDetected(kinds))
    }
}
