//! anchor.rs - Resolves textual anchors into exact byte ranges.
//!
//! An LLM cannot be trusted with numeric offsets, so it describes a span by the quoted
//! text, a little surrounding context and a 1-based occurrence index. Resolution tries,
//! in order: context plus quote, the quote alone, any raw numeric range the model gave,
//! and finally the first character of the text. The last two mark the range as low
//! confidence; the issue itself is always kept.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::issue::{floor_char_boundary, TextRange};
use crate::reconcile::normalize::{normalize, normalize_str, NormalizedText};

/// A textual description of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub quote: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    /// 1-based occurrence index among non-overlapping matches.
    pub nth: usize,
    /// Raw `(start, end)` in characters as reported by the model, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_range: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Context,
    Quote,
    RawRange,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub range: TextRange,
    pub method: ResolutionMethod,
}

impl Resolution {
    pub fn is_low_confidence(&self) -> bool {
        matches!(self.method, ResolutionMethod::RawRange | ResolutionMethod::Fallback)
    }
}

impl Anchor {
    pub fn new(quote: impl Into<String>, before: impl Into<String>, after: impl Into<String>, nth: usize) -> Self {
        Self {
            quote: quote.into(),
            before: before.into(),
            after: after.into(),
            nth: nth.max(1),
            raw_range: None,
        }
    }

    /// Describes `range` of `text` with up to `context_chars` characters on each side.
    /// Resolving the result against the same text yields `range` again.
    pub fn from_text(text: &str, range: TextRange, context_chars: usize) -> Option<Self> {
        let quote = range.slice(text)?;
        let head = &text[..range.start];
        let before_start = head
            .char_indices()
            .rev()
            .nth(context_chars.saturating_sub(1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let before = if context_chars == 0 { "" } else { &head[before_start..] };
        let tail = &text[range.end..];
        let after_end = tail.char_indices().nth(context_chars).map(|(i, _)| i).unwrap_or(tail.len());
        let after = &tail[..after_end];

        let normalized = normalize(text);
        if let Some(nth) = occurrence_of(&normalized, before, quote, after, range.start) {
            return Some(Anchor::new(quote, before, after, nth));
        }
        // Non-overlapping context matches can skip the target.
        if let Some(nth) = occurrence_of(&normalized, "", quote, "", range.start) {
            return Some(Anchor::new(quote, "", "", nth));
        }
        // A self-overlapping quote can hide the target too; the whole prefix as context
        // always pins the first match to it.
        Some(Anchor::new(quote, head, "", 1))
    }
}

fn occurrence_of(normalized: &NormalizedText, before: &str, quote: &str, after: &str, start: usize) -> Option<usize> {
    let regex = anchor_regex(before, quote, after)?;
    let found = regex
        .captures_iter(&normalized.text)
        .filter_map(|caps| caps.get(1))
        .position(|m| normalized.map.map_start(m.start()) == start)
        .map(|p| p + 1);
    found
}

fn anchor_regex(before: &str, quote: &str, after: &str) -> Option<Regex> {
    let pattern = format!(
        "{}({}){}",
        regex::escape(&normalize_str(before)),
        regex::escape(&normalize_str(quote)),
        regex::escape(&normalize_str(after))
    );
    Regex::new(&pattern).ok()
}

/// Finds the `nth` match of `regex` in the normalized text and maps its quote group back
/// to original offsets.
fn nth_match(regex: &Regex, normalized: &NormalizedText, nth: usize) -> Option<TextRange> {
    let caps = regex.captures_iter(&normalized.text).nth(nth.saturating_sub(1))?;
    let quote = caps.get(1)?;
    let start = normalized.map.map_start(quote.start());
    let end = normalized.map.map_end(quote.end());
    (end > start).then(|| TextRange::new(start, end))
}

/// Converts a raw character range into a clamped byte range.
fn range_from_chars(original: &str, (start, end): (usize, usize)) -> TextRange {
    let byte_at = |n: usize| {
        original
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(original.len())
    };
    TextRange::new(byte_at(start), byte_at(end.max(start))).clamp_to(original)
}

/// Resolves `anchor` against `original`, whose normalized form is `normalized`.
pub fn resolve_with(original: &str, normalized: &NormalizedText, anchor: &Anchor) -> Resolution {
    if original.is_empty() {
        return Resolution { range: TextRange::new(0, 0), method: ResolutionMethod::Fallback };
    }
    let nth = anchor.nth.max(1);

    if !normalize_str(&anchor.quote).is_empty() {
        if let Some(range) = anchor_regex(&anchor.before, &anchor.quote, &anchor.after)
            .and_then(|re| nth_match(&re, normalized, nth))
        {
            return finish(original, range, ResolutionMethod::Context);
        }
        if let Some(range) = anchor_regex("", &anchor.quote, "").and_then(|re| nth_match(&re, normalized, nth)) {
            debug!("Anchor context did not match; resolved by quote alone.");
            return finish(original, range, ResolutionMethod::Quote);
        }
    }

    if let Some(raw) = anchor.raw_range {
        debug!("Anchor quote not found; falling back to raw range {:?}.", raw);
        return finish(original, range_from_chars(original, raw), ResolutionMethod::RawRange);
    }

    debug!("Anchor could not be resolved; defaulting to the first character.");
    finish(original, TextRange::new(0, 0).clamp_to(original), ResolutionMethod::Fallback)
}

fn finish(original: &str, range: TextRange, method: ResolutionMethod) -> Resolution {
    let range = if range.is_valid_for(original) {
        range
    } else {
        TextRange::new(floor_char_boundary(original, range.start), range.end).clamp_to(original)
    };
    Resolution { range, method }
}

/// Convenience wrapper that normalizes `original` first.
pub fn resolve(original: &str, anchor: &Anchor) -> Resolution {
    resolve_with(original, &normalize(original), anchor)
}
