//! Fix application and history.
//!
//! Applying a fix never mutates an [`Issue`] in place: every operation takes the current
//! text and issue set and returns new ones, which is what lets [`history::History`] store
//! plain snapshots.
//!
//! License: MIT OR APACHE 2.0

pub mod apply;
pub mod history;

use serde::{Deserialize, Serialize};

use crate::issue::{Category, Issue, IssueSource, Severity, TextRange};

pub use apply::{apply_all_auto_fixes, apply_suggestion, locate, splice};
pub use history::{History, HistoryAction, HistoryEntry};

/// Top suggestions below this confidence are never bulk-applied.
pub const MIN_AUTO_FIX_CONFIDENCE: f64 = 0.8;
/// `|len(original) - len(suggestion)| / len(original)`, measured in characters.
pub const MAX_LENGTH_CHANGE_RATIO: f64 = 0.5;

/// Why an issue was left out of bulk auto-fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligibility {
    NotAutoFix,
    NoSuggestion,
    NotRuleSourced,
    ErrorSeverity,
    CategoryNotSafe,
    LowConfidence,
    LengthChangeTooLarge,
}

/// Returns the first failed safety predicate, or `None` when `issue` may be bulk-applied.
pub fn ineligibility(issue: &Issue) -> Option<Ineligibility> {
    if !issue.metadata.auto_fix {
        return Some(Ineligibility::NotAutoFix);
    }
    let Some(top) = issue.top_suggestion() else {
        return Some(Ineligibility::NoSuggestion);
    };
    if issue.source != IssueSource::Rule {
        return Some(Ineligibility::NotRuleSourced);
    }
    if issue.severity == Severity::Error {
        return Some(Ineligibility::ErrorSeverity);
    }
    if !matches!(issue.category, Category::Consistency | Category::Style) {
        return Some(Ineligibility::CategoryNotSafe);
    }
    // A confidence nobody ever set is treated permissively.
    if let Some(confidence) = top.confidence.or(issue.metadata.confidence) {
        if confidence < MIN_AUTO_FIX_CONFIDENCE {
            return Some(Ineligibility::LowConfidence);
        }
    }
    let original = issue.metadata.original_text.chars().count();
    let suggested = top.text.chars().count();
    if original == 0 || original.abs_diff(suggested) as f64 / original as f64 > MAX_LENGTH_CHANGE_RATIO {
        return Some(Ineligibility::LengthChangeTooLarge);
    }
    None
}

pub fn is_auto_fix_eligible(issue: &Issue) -> bool {
    ineligibility(issue).is_none()
}

/// Result of a single `apply_suggestion` call, shaped for callers across a boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    /// Stable error code such as `STALE_RANGE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFix {
    pub issue_id: String,
    /// Range of the inserted text in the text after this fix.
    pub range: TextRange,
    pub original_text: String,
    pub applied_text: String,
    /// Set when the stored range was stale and the span was found elsewhere.
    pub reanchored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFix {
    pub issue_id: String,
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixSummary {
    pub applied_count: usize,
    pub failed_count: usize,
    pub applied_fixes: Vec<AppliedFix>,
    pub failed_fixes: Vec<FailedFix>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueMetadata, Suggestion};

    fn safe_issue() -> Issue {
        Issue {
            id: "rule-r-0-12".into(),
            source: IssueSource::Rule,
            severity: Severity::Warn,
            category: Category::Consistency,
            message: "m".into(),
            range: TextRange::new(0, 12),
            suggestions: vec![Suggestion::new("食べられる").with_confidence(1.0).preferred()],
            metadata: IssueMetadata {
                original_text: "食べれる".into(),
                auto_fix: true,
                confidence: Some(1.0),
                rule_id: Some("r".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_safe_issue_is_eligible() {
        assert_eq!(ineligibility(&safe_issue()), None);
    }

    #[test]
    fn test_each_predicate_excludes() {
        let mut i = safe_issue();
        i.metadata.auto_fix = false;
        assert_eq!(ineligibility(&i), Some(Ineligibility::NotAutoFix));

        let mut i = safe_issue();
        i.suggestions.clear();
        assert_eq!(ineligibility(&i), Some(Ineligibility::NoSuggestion));

        let mut i = safe_issue();
        i.source = IssueSource::Llm;
        assert_eq!(ineligibility(&i), Some(Ineligibility::NotRuleSourced));

        let mut i = safe_issue();
        i.severity = Severity::Error;
        assert_eq!(ineligibility(&i), Some(Ineligibility::ErrorSeverity));

        let mut i = safe_issue();
        i.category = Category::Honorific;
        assert_eq!(ineligibility(&i), Some(Ineligibility::CategoryNotSafe));

        let mut i = safe_issue();
        i.suggestions[0].confidence = Some(0.5);
        assert_eq!(ineligibility(&i), Some(Ineligibility::LowConfidence));

        let mut i = safe_issue();
        i.suggestions[0].text = "食べることができる".into();
        assert_eq!(ineligibility(&i), Some(Ineligibility::LengthChangeTooLarge));
    }

    #[test]
    fn test_unset_confidence_is_permissive() {
        let mut i = safe_issue();
        i.suggestions[0].confidence = None;
        i.metadata.confidence = None;
        assert!(is_auto_fix_eligible(&i));
    }

    #[test]
    fn test_ratio_boundary_is_inclusive() {
        let mut i = safe_issue();
        // 4 chars -> 6 chars is exactly 0.5.
        i.suggestions[0].text = "食べられるよ".into();
        assert!(is_auto_fix_eligible(&i));
    }
}
