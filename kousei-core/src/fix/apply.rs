//! apply.rs - Offset-safe fix application.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, info, warn};

use crate::errors::KouseiError;
use crate::fix::{ineligibility, AppliedFix, AutoFixSummary, FailedFix};
use crate::issue::{Issue, IssueSet, IssueSource, TextRange};

/// Replaces `range` of `text` with `replacement`.
pub fn splice(text: &str, range: TextRange, replacement: &str) -> Result<String, KouseiError> {
    let range = TextRange::try_new(range.start, range.end, text)?;
    let mut out = String::with_capacity(text.len() - range.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    Ok(out)
}

/// Where `issue` currently applies in `text`. Returns the stored range when it still
/// covers `original_text`, otherwise the first occurrence of `original_text`. The flag
/// is true when the range was re-anchored.
pub fn locate(text: &str, issue: &Issue) -> Result<(TextRange, bool), KouseiError> {
    if !issue.is_stale(text) {
        return Ok((issue.range, false));
    }
    let original = &issue.metadata.original_text;
    if original.is_empty() {
        return Err(KouseiError::StaleRange(issue.id.clone()));
    }
    match text.find(original.as_str()) {
        Some(start) => {
            debug!("Issue '{}' re-anchored from {} to {}.", issue.id, issue.range, start);
            Ok((TextRange::new(start, start + original.len()), true))
        }
        None => Err(KouseiError::StaleRange(issue.id.clone())),
    }
}

/// Moves every issue other than `except` to account for `edited` being replaced by
/// `inserted_len` bytes. Issues overlapping the edit no longer describe the text and
/// are dropped.
fn rebase_issues(issues: IssueSet, except: &str, edited: TextRange, inserted_len: usize) -> IssueSet {
    let delta = inserted_len as isize - edited.len() as isize;
    issues
        .into_iter()
        .filter_map(|issue| {
            if issue.id == except || issue.range.end <= edited.start {
                Some(issue)
            } else if issue.range.start >= edited.end {
                let range = issue.range.shifted(delta);
                Some(Issue { range, ..issue })
            } else {
                debug!("Dropping issue '{}' that overlapped an applied fix.", issue.id);
                None
            }
        })
        .collect()
}

/// Applies suggestion `suggestion_index` of issue `issue_id`. The applied issue stays in
/// the returned set, now covering the inserted text, so its other suggestions remain
/// available.
pub fn apply_suggestion(
    text: &str,
    issues: &IssueSet,
    issue_id: &str,
    suggestion_index: usize,
) -> Result<(String, IssueSet, AppliedFix), KouseiError> {
    let issue = issues
        .iter()
        .find(|i| i.id == issue_id)
        .ok_or_else(|| KouseiError::IssueNotFound(issue_id.to_string()))?;
    if issue.source == IssueSource::Llm {
        return Err(KouseiError::NotApplicable(issue_id.to_string()));
    }
    let suggestion = issue
        .suggestions
        .get(suggestion_index)
        .ok_or_else(|| KouseiError::SuggestionNotFound(issue_id.to_string(), suggestion_index))?;

    let (range, reanchored) = locate(text, issue)?;
    let new_text = splice(text, range, &suggestion.text)?;
    let applied_range = TextRange::new(range.start, range.start + suggestion.text.len());
    let fix = AppliedFix {
        issue_id: issue.id.clone(),
        range: applied_range,
        original_text: issue.metadata.original_text.clone(),
        applied_text: suggestion.text.clone(),
        reanchored,
    };

    let mut updated = issue.clone();
    updated.range = applied_range;
    updated.metadata.original_text = suggestion.text.clone();

    let base: IssueSet = issues
        .iter()
        .map(|i| if i.id == issue_id { updated.clone() } else { i.clone() })
        .collect();
    let new_issues = rebase_issues(base, issue_id, range, suggestion.text.len());
    Ok((new_text, new_issues, fix))
}

/// Applies every safe auto-fix, right to left. Applied issues leave the set; an issue
/// whose span no longer matches exactly, or that overlaps a fix already applied, is
/// reported as failed without stopping the batch.
pub fn apply_all_auto_fixes(text: &str, issues: &IssueSet) -> (String, IssueSet, AutoFixSummary) {
    let mut candidates: Vec<&Issue> = issues.iter().filter(|i| ineligibility(i).is_none()).collect();
    candidates.sort_by(|a, b| b.range.start.cmp(&a.range.start).then_with(|| b.range.end.cmp(&a.range.end)));

    let mut current = text.to_string();
    let mut remaining = issues.clone();
    let mut summary = AutoFixSummary::default();
    // Leftmost start of anything already edited, in current-text coordinates.
    let mut edited_floor = usize::MAX;

    for issue in candidates {
        let fail = |code: &str, reason: String| FailedFix {
            issue_id: issue.id.clone(),
            code: code.to_string(),
            reason,
        };
        if issue.range.end > edited_floor {
            summary.failed_fixes.push(fail("OVERLAPPING_FIX", "overlaps a fix applied in this batch".into()));
            continue;
        }
        if issue.is_stale(&current) {
            let err = KouseiError::StaleRange(issue.id.clone());
            summary.failed_fixes.push(fail(err.code(), err.to_string()));
            continue;
        }
        let Some(suggestion) = issue.top_suggestion() else {
            continue;
        };
        match splice(&current, issue.range, &suggestion.text) {
            Ok(next) => {
                current = next;
                edited_floor = issue.range.start;
                remaining.retain(|i| i.id != issue.id);
                remaining = rebase_issues(remaining, &issue.id, issue.range, suggestion.text.len());
                summary.applied_fixes.push(AppliedFix {
                    issue_id: issue.id.clone(),
                    range: TextRange::new(issue.range.start, issue.range.start + suggestion.text.len()),
                    original_text: issue.metadata.original_text.clone(),
                    applied_text: suggestion.text.clone(),
                    reanchored: false,
                });
            }
            Err(err) => {
                warn!("Auto-fix for '{}' failed: {}", issue.id, err);
                summary.failed_fixes.push(fail(err.code(), err.to_string()));
            }
        }
    }

    summary.applied_count = summary.applied_fixes.len();
    summary.failed_count = summary.failed_fixes.len();
    summary.message = match (summary.applied_count, summary.failed_count) {
        (0, 0) => "No safe auto-fixes to apply.".to_string(),
        (applied, 0) => format!("Applied {} fix(es).", applied),
        (applied, failed) => format!("Applied {} fix(es); {} could not be applied.", applied, failed),
    };
    info!("{}", summary.message);
    (current, remaining, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::Ineligibility;
    use crate::issue::{Category, IssueMetadata, Severity, Suggestion};

    fn rule_issue(text: &str, id: &str, needle: &str, replacement: &str) -> Issue {
        let start = text.find(needle).unwrap();
        Issue {
            id: id.into(),
            source: IssueSource::Rule,
            severity: Severity::Warn,
            category: Category::Style,
            message: "m".into(),
            range: TextRange::new(start, start + needle.len()),
            suggestions: vec![Suggestion::new(replacement).with_confidence(1.0).preferred()],
            metadata: IssueMetadata {
                original_text: needle.into(),
                auto_fix: true,
                confidence: Some(1.0),
                rule_id: Some(id.into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_splice_rejects_bad_ranges() {
        assert_eq!(splice("あいう", TextRange::new(3, 6), "X").unwrap(), "あXう");
        assert_eq!(splice("あいう", TextRange::new(1, 3), "X").unwrap_err().code(), "INVALID_RANGE");
        assert_eq!(splice("あいう", TextRange::new(3, 3), "X").unwrap_err().code(), "INVALID_RANGE");
    }

    #[test]
    fn test_apply_suggestion_keeps_issue_and_shifts_others() {
        let text = "食べれるし、見れる。";
        let issues = vec![
            rule_issue(text, "a", "食べれる", "食べられる"),
            rule_issue(text, "b", "見れる", "見られる"),
        ];
        let (new_text, new_issues, fix) = apply_suggestion(text, &issues, "a", 0).unwrap();
        assert_eq!(new_text, "食べられるし、見れる。");
        assert_eq!(fix.range.slice(&new_text), Some("食べられる"));
        assert!(!fix.reanchored);

        let a = new_issues.iter().find(|i| i.id == "a").unwrap();
        assert_eq!(a.range.slice(&new_text), Some("食べられる"));
        assert!(!a.is_stale(&new_text));
        let b = new_issues.iter().find(|i| i.id == "b").unwrap();
        assert_eq!(b.range.slice(&new_text), Some("見れる"));
    }

    #[test]
    fn test_stale_range_reanchors_then_fails() {
        let text = "食べれる";
        let mut issue = rule_issue(text, "a", "食べれる", "食べられる");
        let shifted_text = "ああ食べれる";
        let (new_text, _, fix) = apply_suggestion(shifted_text, &vec![issue.clone()], "a", 0).unwrap();
        assert_eq!(new_text, "ああ食べられる");
        assert!(fix.reanchored);

        issue.metadata.original_text = "存在しない".into();
        let err = apply_suggestion(text, &vec![issue], "a", 0).unwrap_err();
        assert_eq!(err.code(), "STALE_RANGE");
    }

    #[test]
    fn test_llm_issue_is_not_applicable() {
        let text = "食べれる";
        let mut issue = rule_issue(text, "a", "食べれる", "食べられる");
        issue.source = IssueSource::Llm;
        let err = apply_suggestion(text, &vec![issue], "a", 0).unwrap_err();
        assert_eq!(err.code(), "NOT_APPLICABLE");
    }

    #[test]
    fn test_missing_issue_and_suggestion() {
        let text = "食べれる";
        let issues = vec![rule_issue(text, "a", "食べれる", "食べられる")];
        assert_eq!(apply_suggestion(text, &issues, "zz", 0).unwrap_err().code(), "ISSUE_NOT_FOUND");
        assert_eq!(apply_suggestion(text, &issues, "a", 3).unwrap_err().code(), "SUGGESTION_NOT_FOUND");
    }

    #[test]
    fn test_bulk_applies_right_to_left() {
        let text = "食べれるし、見れるし、来れる。";
        let issues = vec![
            rule_issue(text, "a", "食べれる", "食べられる"),
            rule_issue(text, "b", "見れる", "見られる"),
            rule_issue(text, "c", "来れる", "来られる"),
        ];
        let (new_text, remaining, summary) = apply_all_auto_fixes(text, &issues);
        assert_eq!(new_text, "食べられるし、見られるし、来られる。");
        assert_eq!(summary.applied_count, 3);
        assert_eq!(summary.failed_count, 0);
        assert!(remaining.is_empty());
        let order: Vec<&str> = summary.applied_fixes.iter().map(|f| f.issue_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_bulk_itemizes_failures_and_keeps_ineligible() {
        let text = "食べれるし、見れる。";
        let mut stale = rule_issue(text, "stale", "見れる", "見られる");
        stale.metadata.original_text = "見れた".into();
        let mut risky = rule_issue(text, "risky", "食べれる", "食べられる");
        risky.category = Category::Risk;
        let long = rule_issue(text, "long", "し", "しかも");
        assert_eq!(ineligibility(&long), Some(Ineligibility::LengthChangeTooLarge));

        let (new_text, remaining, summary) = apply_all_auto_fixes(text, &vec![stale, risky, long]);
        assert_eq!(new_text, text);
        assert_eq!(summary.applied_count, 0);
        assert_eq!(summary.failed_fixes.len(), 1);
        assert_eq!(summary.failed_fixes[0].issue_id, "stale");
        assert_eq!(summary.failed_fixes[0].code, "STALE_RANGE");
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().any(|i| i.id == "long"));
    }

    #[test]
    fn test_bulk_skips_overlapping_fix() {
        let text = "食べれる";
        let whole = rule_issue(text, "whole", "食べれる", "食べられる");
        let mut tail = rule_issue(text, "tail", "れる", "られる");
        tail.metadata.confidence = Some(1.0);
        let (new_text, _, summary) = apply_all_auto_fixes(text, &vec![whole, tail]);
        assert_eq!(new_text, "食べられる");
        assert_eq!(summary.applied_count, 1);
        assert_eq!(summary.failed_fixes[0].code, "OVERLAPPING_FIX");
    }
}
