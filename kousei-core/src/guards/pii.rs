//! pii.rs - Masks personal information before text leaves the process.
//!
//! Each PII kind has an independent pattern. Candidate spans from all patterns are
//! resolved into a non-overlapping set (earliest start wins, ties go to the pattern listed
//! first) and replaced back to front so earlier offsets stay valid.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::issue::TextRange;
use crate::redaction::{log_sensitive_match_debug, PiiMatch};
use crate::validators::{find_card_numbers, is_valid_my_number};

/// What must not touch a numeric span on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    None,
    Digit,
    AsciiAlphanumeric,
}

enum Matcher {
    /// Masks capture group `group` of each match.
    Regex { regex: Regex, group: usize },
    /// Group-aligned Luhn windows; see [`find_card_numbers`].
    CardNumbers,
}

enum Source {
    Pattern(&'static str, usize),
    CardNumbers,
}

struct PiiPattern {
    kind: &'static str,
    token: &'static str,
    matcher: Matcher,
    boundary: Boundary,
    validator: Option<fn(&str) -> bool>,
}

fn has_four_digits(s: &str) -> bool {
    s.chars().filter(|c| c.is_ascii_digit()).count() >= 4
}

lazy_static! {
    static ref PII_PATTERNS: Vec<PiiPattern> = {
        let table: Vec<(&str, &str, Source, Boundary, Option<fn(&str) -> bool>)> = vec![
            (
                "email",
                "[EMAIL]",
                Source::Pattern(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}", 0),
                Boundary::None,
                None,
            ),
            (
                "phone",
                "[PHONE]",
                Source::Pattern(r"(?:\+81[\- ]?[1-9]\d{0,3}|0\d{1,4})[\-－ ]?\d{1,4}[\-－ ]?\d{3,4}", 0),
                Boundary::Digit,
                None,
            ),
            ("card", "[CARD]", Source::CardNumbers, Boundary::None, None),
            (
                "national_id",
                "[NATIONAL_ID]",
                Source::Pattern(r"\d{4}[\- ]?\d{4}[\- ]?\d{4}", 0),
                Boundary::Digit,
                Some(is_valid_my_number as fn(&str) -> bool),
            ),
            ("postal_code", "[POSTAL_CODE]", Source::Pattern(r"〒?\s?\d{3}[\-－]\d{4}", 0), Boundary::Digit, None),
            (
                "address",
                "[ADDRESS]",
                Source::Pattern(
                    r"(?:東京都|北海道|(?:京都|大阪)府|\p{Han}{2,3}県)\p{Han}{1,6}?[市区町村郡][\p{Han}ヶの0-9０-９\-－]{0,20}",
                    0,
                ),
                Boundary::None,
                None,
            ),
            ("name", "[NAME]", Source::Pattern(r"(\p{Han}{2,4})(?:様|さん|氏|殿)", 1), Boundary::None, None),
            (
                "id",
                "[ID]",
                Source::Pattern(r"[A-Za-z0-9]{12,}", 0),
                Boundary::AsciiAlphanumeric,
                Some(has_four_digits as fn(&str) -> bool),
            ),
        ];
        table
            .into_iter()
            .filter_map(|(kind, token, source, boundary, validator)| {
                let matcher = match source {
                    Source::Pattern(pattern, group) => match Regex::new(pattern) {
                        Ok(regex) => Matcher::Regex { regex, group },
                        Err(e) => {
                            warn!("PII pattern '{}' failed to compile: {}", kind, e);
                            return None;
                        }
                    },
                    Source::CardNumbers => Matcher::CardNumbers,
                };
                Some(PiiPattern { kind, token, matcher, boundary, validator })
            })
            .collect()
    };
}

fn touches(text: &str, start: usize, end: usize, boundary: Boundary) -> bool {
    let blocked = |c: char| match boundary {
        Boundary::None => false,
        Boundary::Digit => c.is_ascii_digit() || ('０'..='９').contains(&c),
        Boundary::AsciiAlphanumeric => c.is_ascii_alphanumeric(),
    };
    text[..start].chars().next_back().is_some_and(blocked) || text[end..].chars().next().is_some_and(blocked)
}

/// The masked text plus every accepted match, with ranges into the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskResult {
    pub masked_text: String,
    pub matches: Vec<PiiMatch>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PiiMasker;

impl PiiMasker {
    pub fn new() -> Self {
        Self
    }

    /// All candidate spans, before overlap resolution, in pattern order.
    pub fn candidates(&self, text: &str) -> Vec<PiiMatch> {
        let mut found = Vec::new();
        for pattern in PII_PATTERNS.iter() {
            let spans: Vec<(usize, usize)> = match &pattern.matcher {
                Matcher::Regex { regex, group } => regex
                    .captures_iter(text)
                    .filter_map(|caps| caps.get(*group).map(|m| (m.start(), m.end())))
                    .collect(),
                Matcher::CardNumbers => find_card_numbers(text),
            };
            for (start, end) in spans {
                if start == end || touches(text, start, end, pattern.boundary) {
                    continue;
                }
                let value = &text[start..end];
                if let Some(validate) = pattern.validator {
                    if !validate(value) {
                        continue;
                    }
                }
                found.push(PiiMatch {
                    kind: pattern.kind.to_string(),
                    value: value.to_string(),
                    masked_value: pattern.token.to_string(),
                    range: TextRange::new(start, end),
                });
            }
        }
        found
    }

    /// Resolves candidates into a sorted, non-overlapping set.
    pub fn find(&self, text: &str) -> Vec<PiiMatch> {
        let mut candidates = self.candidates(text);
        // Stable: equal starts keep pattern order.
        candidates.sort_by_key(|m| m.range.start);
        let mut accepted: Vec<PiiMatch> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match accepted.last() {
                Some(last) if last.range.end > candidate.range.start => {
                    debug!(
                        "Discarding '{}' candidate at {} overlapping '{}' at {}.",
                        candidate.kind, candidate.range, last.kind, last.range
                    );
                }
                _ => accepted.push(candidate),
            }
        }
        accepted
    }

    pub fn mask(&self, text: &str) -> MaskResult {
        let matches = self.find(text);
        let mut masked_text = text.to_string();
        for m in matches.iter().rev() {
            log_sensitive_match_debug("[kousei_core::guards::pii]", m);
            masked_text.replace_range(m.range.start..m.range.end, &m.masked_value);
        }
        if !matches.is_empty() {
            debug!("Masked {} PII span(s).", matches.len());
        }
        MaskResult { masked_text, matches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_each_kind() {
        let masker = PiiMasker::new();
        let text = "山田太郎様、連絡先は taro@example.co.jp または 03-1234-5678 です。〒100-0001 東京都千代田区千代田1-1 まで。";
        let result = masker.mask(text);
        assert_eq!(
            result.masked_text,
            "[NAME]様、連絡先は [EMAIL] または [PHONE] です。[POSTAL_CODE] [ADDRESS] まで。"
        );
        let kinds: Vec<&str> = result.matches.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(kinds, vec!["name", "email", "phone", "postal_code", "address"]);
    }

    #[test]
    fn test_card_and_national_id_require_checksums() {
        let masker = PiiMasker::new();
        let masked = masker.mask("番号 4111111111111111 と 123456789018").masked_text;
        assert_eq!(masked, "番号 [CARD] と [NATIONAL_ID]");
        let untouched = masker.mask("番号 123456789012").masked_text;
        assert_eq!(untouched, "番号 [ID]");
    }

    #[test]
    fn test_card_masked_when_followed_by_more_digits() {
        let masker = PiiMasker::new();
        let masked = masker.mask("カード 4111111111111111 1234567890123456 です").masked_text;
        assert!(masked.starts_with("カード [CARD] "), "masked: {}", masked);
        assert!(!masked.contains("4111111111111111"));

        let masked = masker.mask("4111 1111 1111 1111 2024 0101 9999").masked_text;
        assert!(masked.starts_with("[CARD] "), "masked: {}", masked);
        assert!(!masked.contains("4111 1111"));
    }

    #[test]
    fn test_generic_id_needs_digits() {
        let masker = PiiMasker::new();
        assert_eq!(masker.mask("ABCDEFGHIJKLMN").masked_text, "ABCDEFGHIJKLMN");
        assert_eq!(masker.mask("会員ID AB12CD34EF56").masked_text, "会員ID [ID]");
    }

    #[test]
    fn test_accepted_matches_never_overlap() {
        let masker = PiiMasker::new();
        let text = "0312345678901234 info@example.com 佐藤様 090-1234-5678";
        let matches = masker.find(text);
        for pair in matches.windows(2) {
            assert!(pair[0].range.end <= pair[1].range.start);
        }
    }

    #[test]
    fn test_ranges_point_into_original_text() {
        let masker = PiiMasker::new();
        let text = "担当: 鈴木さん (suzuki@example.com)";
        for m in masker.find(text) {
            assert_eq!(m.range.slice(text), Some(m.value.as_str()));
        }
    }
}
