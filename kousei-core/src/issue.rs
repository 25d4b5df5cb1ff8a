// kousei-core/src/issue.rs
//! Core data structures for detected issues and the text ranges they point at.
//!
//! Every range in this crate is a pair of UTF-8 byte offsets into the analyzed text and
//! always falls on `char` boundaries, so `&text[range.start..range.end]` never panics on a
//! range that passed [`TextRange::try_new`]. Conversions to `char` and UTF-16 offsets are
//! provided for consumers that index strings differently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::KouseiError;

/// How serious a detected issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Warn, Severity::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of problem an issue describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Style,
    Grammar,
    Honorific,
    Consistency,
    Risk,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Style,
        Category::Grammar,
        Category::Honorific,
        Category::Consistency,
        Category::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Style => "style",
            Category::Grammar => "grammar",
            Category::Honorific => "honorific",
            Category::Consistency => "consistency",
            Category::Risk => "risk",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "style" => Ok(Category::Style),
            "grammar" => Ok(Category::Grammar),
            "honorific" => Ok(Category::Honorific),
            "consistency" => Ok(Category::Consistency),
            "risk" => Ok(Category::Risk),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open byte range `[start, end)` into a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Builds a range and checks it against `text`: `start < end <= len` and both ends on
    /// `char` boundaries.
    pub fn try_new(start: usize, end: usize, text: &str) -> Result<Self, KouseiError> {
        let range = Self { start, end };
        if range.is_valid_for(text) {
            Ok(range)
        } else {
            Err(KouseiError::InvalidRange { start, end, len: text.len() })
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn is_valid_for(&self, text: &str) -> bool {
        self.start < self.end
            && self.end <= text.len()
            && text.is_char_boundary(self.start)
            && text.is_char_boundary(self.end)
    }

    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        text.get(self.start..self.end)
    }

    pub fn shifted(&self, delta: isize) -> TextRange {
        TextRange {
            start: self.start.saturating_add_signed(delta),
            end: self.end.saturating_add_signed(delta),
        }
    }

    /// Clamps the range into `text`, snapping both ends onto `char` boundaries and
    /// widening it to cover at least one character. Returns an empty `0..0` range only
    /// for empty text.
    pub fn clamp_to(&self, text: &str) -> TextRange {
        if text.is_empty() {
            return TextRange::new(0, 0);
        }
        let mut start = floor_char_boundary(text, self.start.min(text.len()));
        let mut end = ceil_char_boundary(text, self.end.min(text.len()));
        if start >= text.len() {
            start = floor_char_boundary(text, text.len() - 1);
        }
        if end <= start {
            end = next_char_boundary(text, start);
        }
        TextRange { start, end }
    }

    /// Splits `text` at the range, widened outward onto `char` boundaries.
    fn snapped<'a>(&self, text: &'a str) -> (&'a str, &'a str) {
        let start = floor_char_boundary(text, self.start);
        let end = ceil_char_boundary(text, self.end).max(start);
        (&text[..start], &text[start..end])
    }

    /// Returns the range as `char` offsets. Ends off a `char` boundary are widened onto one.
    pub fn char_range(&self, text: &str) -> (usize, usize) {
        let (head, body) = self.snapped(text);
        let start = head.chars().count();
        (start, start + body.chars().count())
    }

    /// Returns the range as UTF-16 code unit offsets, snapped like [`TextRange::char_range`].
    pub fn utf16_range(&self, text: &str) -> (usize, usize) {
        let (head, body) = self.snapped(text);
        let start = head.encode_utf16().count();
        (start, start + body.encode_utf16().count())
    }

    /// Converts a range given in `char` offsets into a byte range.
    pub fn from_char_range(text: &str, start: usize, end: usize) -> Option<TextRange> {
        let byte_at = |n: usize| -> Option<usize> {
            if n == text.chars().count() {
                Some(text.len())
            } else {
                text.char_indices().nth(n).map(|(i, _)| i)
            }
        };
        let range = TextRange::new(byte_at(start)?, byte_at(end)?);
        range.is_valid_for(text).then_some(range)
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

pub(crate) fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

pub(crate) fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

pub(crate) fn next_char_boundary(text: &str, index: usize) -> usize {
    text[index..]
        .chars()
        .next()
        .map(|c| index + c.len_utf8())
        .unwrap_or(text.len())
}

/// One proposed replacement for an issue's span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// In `[0, 1]`. `None` means the source never stated a confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_preferred: bool,
}

impl Suggestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rationale: None,
            confidence: None,
            is_preferred: false,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn preferred(mut self) -> Self {
        self.is_preferred = true;
        self
    }
}

/// Where an issue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    Rule,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueMetadata {
    /// The exact slice `range` pointed at when the issue was created.
    pub original_text: String,
    pub auto_fix: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// The id the model gave the issue, if any. Not unique across passages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_id: Option<String>,
    /// Set on the placeholder issue returned for an unusable LLM response.
    pub fallback: bool,
    /// Set when the range could not be recovered from the issue's textual anchor.
    pub low_confidence: bool,
}

/// One concrete detected problem, anchored to a range of the analyzed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub source: IssueSource,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    pub range: TextRange,
    pub suggestions: Vec<Suggestion>,
    pub metadata: IssueMetadata,
}

impl Issue {
    /// The slice the issue currently points at, if the range is still valid for `text`.
    pub fn current_slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.range.is_valid_for(text) {
            self.range.slice(text)
        } else {
            None
        }
    }

    /// True when the range no longer covers `metadata.original_text`.
    pub fn is_stale(&self, text: &str) -> bool {
        self.current_slice(text) != Some(self.metadata.original_text.as_str())
    }

    pub fn top_suggestion(&self) -> Option<&Suggestion> {
        self.suggestions
            .iter()
            .find(|s| s.is_preferred)
            .or_else(|| self.suggestions.first())
    }
}

/// An ordered issue list.
pub type IssueSet = Vec<Issue>;

/// Sorts ascending by start offset, breaking ties by rule id (then issue id) so the
/// order is deterministic.
pub fn sort_issues(issues: &mut IssueSet) {
    issues.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then_with(|| a.metadata.rule_id.cmp(&b.metadata.rule_id))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Merges rule- and LLM-sourced issues into a single position-sorted set. Rule issues
/// sort ahead of LLM issues at the same start offset.
pub fn merge_issue_sets(rule_issues: IssueSet, llm_issues: IssueSet) -> IssueSet {
    let mut merged: IssueSet = rule_issues.into_iter().chain(llm_issues).collect();
    merged.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then_with(|| source_rank(a.source).cmp(&source_rank(b.source)))
            .then_with(|| a.metadata.rule_id.cmp(&b.metadata.rule_id))
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

fn source_rank(source: IssueSource) -> u8 {
    match source {
        IssueSource::Rule => 0,
        IssueSource::Llm => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str, source: IssueSource, start: usize, end: usize) -> Issue {
        Issue {
            id: id.to_string(),
            source,
            severity: Severity::Warn,
            category: Category::Style,
            message: String::new(),
            range: TextRange::new(start, end),
            suggestions: Vec::new(),
            metadata: IssueMetadata::default(),
        }
    }

    #[test]
    fn test_try_new_rejects_split_char() {
        let text = "食べれる";
        assert!(TextRange::try_new(0, 3, text).is_ok());
        assert!(TextRange::try_new(0, 2, text).is_err());
        assert!(TextRange::try_new(3, 3, text).is_err());
        assert!(TextRange::try_new(0, 13, text).is_err());
    }

    #[test]
    fn test_char_and_utf16_ranges() {
        let text = "食べれる";
        let range = TextRange::new(0, text.len());
        assert_eq!(range.char_range(text), (0, 4));
        assert_eq!(range.utf16_range(text), (0, 4));
        assert_eq!(TextRange::from_char_range(text, 1, 3), Some(TextRange::new(3, 9)));
    }

    #[test]
    fn test_utf16_counts_surrogate_pairs() {
        let text = "a𠮷b";
        let range = TextRange::new(1, 5);
        assert_eq!(range.char_range(text), (1, 2));
        assert_eq!(range.utf16_range(text), (1, 3));
    }

    #[test]
    fn test_offset_conversion_snaps_split_chars() {
        let text = "食べれる";
        assert_eq!(TextRange::new(1, 4).char_range(text), (0, 2));
        assert_eq!(TextRange::new(4, 5).utf16_range(text), (1, 2));
        assert_eq!(TextRange::new(7, 2).char_range(text), (2, 2));
        assert_eq!(TextRange::new(10, 99).char_range(text), (3, 4));
    }

    #[test]
    fn test_clamp_to_always_non_empty() {
        let text = "あいう";
        assert_eq!(TextRange::new(20, 40).clamp_to(text), TextRange::new(6, 9));
        assert_eq!(TextRange::new(4, 4).clamp_to(text), TextRange::new(3, 6));
        assert_eq!(TextRange::new(0, 0).clamp_to(""), TextRange::new(0, 0));
    }

    #[test]
    fn test_severity_parse_accepts_warning_alias() {
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warn));
        assert!("fatal".parse::<Severity>().is_err());
        assert_eq!("Honorific".parse::<Category>(), Ok(Category::Honorific));
    }

    #[test]
    fn test_merge_orders_rule_before_llm_at_same_start() {
        let merged = merge_issue_sets(
            vec![issue("r2", IssueSource::Rule, 5, 6), issue("r1", IssueSource::Rule, 0, 1)],
            vec![issue("l1", IssueSource::Llm, 5, 7), issue("l0", IssueSource::Llm, 2, 3)],
        );
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "l0", "r2", "l1"]);
    }

    #[test]
    fn test_is_stale_detects_moved_text() {
        let mut i = issue("a", IssueSource::Rule, 0, 3);
        i.metadata.original_text = "abc".into();
        assert!(!i.is_stale("abcdef"));
        assert!(i.is_stale("xabcdef"));
    }
}
