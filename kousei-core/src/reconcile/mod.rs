//! LLM output reconciliation.
//!
//! Raw model output goes through JSON extraction, [`schema`] validation and [`anchor`]
//! resolution against the text the model was shown, producing ordinary [`Issue`]s with
//! exact byte ranges. An unusable response becomes a single fallback issue rather than an
//! empty result.
//!
//! License: MIT OR APACHE 2.0

pub mod anchor;
pub mod normalize;
pub mod schema;

use log::{debug, warn};
use uuid::Uuid;

use crate::config::SchemaLimits;
use crate::errors::KouseiError;
use crate::issue::{Category, Issue, IssueMetadata, IssueSet, IssueSource, Severity, TextRange};
use crate::llm::extract::extract_json;

pub use anchor::{resolve, resolve_with, Anchor, Resolution, ResolutionMethod};
pub use normalize::{normalize, normalize_str, IndexMap, NormalizedText};
pub use schema::{validate_response, ValidatedIssue, ValidationReport};

pub const FALLBACK_MESSAGE: &str = "AIの提案を読み取れませんでした。しばらくしてから再度お試しください。";

/// The placeholder returned when a response could not be used at all.
pub fn fallback_issue(original: &str) -> Issue {
    let range = TextRange::new(0, 0).clamp_to(original);
    Issue {
        id: format!("llm-fallback-{}", Uuid::new_v4()),
        source: IssueSource::Llm,
        severity: Severity::Info,
        category: Category::Style,
        message: FALLBACK_MESSAGE.to_string(),
        range,
        suggestions: Vec::new(),
        metadata: IssueMetadata {
            original_text: range.slice(original).unwrap_or_default().to_string(),
            fallback: true,
            low_confidence: true,
            ..Default::default()
        },
    }
}

/// Anchors validated issues to `original`.
pub fn reconcile_issues(original: &str, validated: &[ValidatedIssue]) -> IssueSet {
    let normalized = normalize(original);
    validated
        .iter()
        .map(|v| {
            let resolution = resolve_with(original, &normalized, &v.anchor);
            if resolution.is_low_confidence() {
                debug!("LLM issue anchored by {:?}; marked low confidence.", resolution.method);
            }
            let confidence = v
                .suggestions
                .iter()
                .find(|s| s.is_preferred)
                .or_else(|| v.suggestions.first())
                .and_then(|s| s.confidence);
            Issue {
                id: format!("llm-{}", Uuid::new_v4()),
                source: IssueSource::Llm,
                severity: v.severity,
                category: v.category,
                message: v.message.clone(),
                range: resolution.range,
                suggestions: v.suggestions.clone(),
                metadata: IssueMetadata {
                    original_text: resolution.range.slice(original).unwrap_or_default().to_string(),
                    auto_fix: false,
                    confidence,
                    rule_id: None,
                    llm_id: v.id.clone(),
                    fallback: false,
                    low_confidence: resolution.is_low_confidence(),
                },
            }
        })
        .collect()
}

/// Turns raw model output into issues over `original`, failing with
/// `SCHEMA_VALIDATION_FAILURE` when the response is unusable as a whole.
pub fn try_reconcile_response(original: &str, raw: &str, limits: &SchemaLimits) -> Result<IssueSet, KouseiError> {
    let payload = extract_json(raw).ok_or_else(|| {
        KouseiError::SchemaValidation(format!("no JSON found in LLM response ({} chars)", raw.chars().count()))
    })?;
    let report = validate_response(&payload, limits);
    if let Some(err) = report.failure() {
        return Err(err);
    }
    if report.dropped_issues > 0 || report.dropped_suggestions > 0 {
        debug!(
            "Schema validation dropped {} issue(s) and {} suggestion(s).",
            report.dropped_issues, report.dropped_suggestions
        );
    }
    Ok(reconcile_issues(original, &report.issues))
}

/// Turns raw model output into issues over `original`. An unusable response yields the
/// single [`fallback_issue`].
pub fn reconcile_response(original: &str, raw: &str, limits: &SchemaLimits) -> IssueSet {
    try_reconcile_response(original, raw, limits).unwrap_or_else(|err| {
        warn!("{}: {}; returning the fallback issue.", err.code(), err);
        vec![fallback_issue(original)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_example_response() {
        let text = "コンピュータの表記";
        let raw = r#"```json
{"issues": [{"severity": "info", "category": "consistency", "message": "表記",
  "quote": "コンピュータ", "before": "", "after": "の", "nth": 1,
  "suggestions": [{"text": "コンピューター", "confidence": 0.9}]}]}
```"#;
        let issues = reconcile_response(text, raw, &SchemaLimits::default());
        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.source, IssueSource::Llm);
        assert_eq!(issue.range.slice(text), Some("コンピュータ"));
        assert_eq!(issue.metadata.original_text, "コンピュータ");
        assert_eq!(issue.metadata.confidence, Some(0.9));
        assert!(!issue.metadata.low_confidence);
        assert_eq!(issue.metadata.llm_id, None);
    }

    #[test]
    fn test_model_issue_id_is_kept_in_metadata() {
        let text = "見れる。見れる。";
        let raw = r#"{"issues": [
            {"id": "i1", "severity": "warn", "category": "grammar", "message": "ら抜き", "quote": "見れる"},
            {"id": "i1", "severity": "warn", "category": "grammar", "message": "ら抜き", "quote": "見れる", "nth": 2}
        ]}"#;
        let issues = reconcile_response(text, raw, &SchemaLimits::default());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.metadata.llm_id.as_deref() == Some("i1")));
        assert_ne!(issues[0].id, issues[1].id);
        assert!(issues[0].id.starts_with("llm-"));
    }

    #[test]
    fn test_garbage_yields_single_fallback() {
        let issues = reconcile_response("本文", "申し訳ありませんが、できません。", &SchemaLimits::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].metadata.fallback);
        assert_eq!(issues[0].severity, Severity::Info);
        assert!(issues[0].suggestions.is_empty());
        assert_eq!(issues[0].range.slice("本文"), Some("本"));
    }

    #[test]
    fn test_unusable_response_surfaces_schema_error() {
        let err = try_reconcile_response("本文", "できません。", &SchemaLimits::default()).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_VALIDATION_FAILURE");
        let err = try_reconcile_response("本文", r#"{"result": "ok"}"#, &SchemaLimits::default()).unwrap_err();
        assert!(err.to_string().contains("`issues` array"));
        assert!(try_reconcile_response("本文", r#"{"issues": []}"#, &SchemaLimits::default()).is_ok());
    }

    #[test]
    fn test_empty_issue_list_is_not_a_failure() {
        let issues = reconcile_response("本文", r#"{"issues": []}"#, &SchemaLimits::default());
        assert!(issues.is_empty());
    }
}
