//! schema.rs - Field-by-field validation of untrusted LLM output.
//!
//! The raw payload is handled as a `serde_json::Value` and never deserialized straight
//! into an [`Issue`](crate::issue::Issue). Each item is checked on its own: a bad item or
//! suggestion is dropped and logged, the rest of the batch survives. Only a structurally
//! broken payload, or one where every item is bad, is reported as unusable.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::config::SchemaLimits;
use crate::errors::KouseiError;
use crate::issue::{Category, Severity, Suggestion};
use crate::reconcile::anchor::Anchor;

const MAX_NTH: usize = 1000;

/// One LLM issue that passed validation. Not yet anchored to offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIssue {
    pub id: Option<String>,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    pub anchor: Anchor,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidatedIssue>,
    pub dropped_issues: usize,
    pub dropped_suggestions: usize,
    pub errors: Vec<String>,
    /// The payload was unusable as a whole.
    pub unusable: bool,
}

impl ValidationReport {
    /// `SCHEMA_VALIDATION_FAILURE` carrying the last recorded problem, when the payload was
    /// unusable as a whole. Per-item drops alone are not a failure.
    pub fn failure(&self) -> Option<KouseiError> {
        self.unusable.then(|| {
            let reason = self.errors.last().cloned().unwrap_or_else(|| "response is unusable".to_string());
            KouseiError::SchemaValidation(reason)
        })
    }
}

fn record_unusable(report: &mut ValidationReport, reason: String) {
    report.errors.push(reason);
    report.unusable = true;
    if let Some(err) = report.failure() {
        warn!("{}: {}", err.code(), err);
    }
}

/// Removes control characters and HTML-special characters from display text.
pub fn sanitize_display(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '&' | '"' | '\''))
        .collect()
}

/// Removes control characters other than newline and tab. Anchor text must still match
/// the document, so HTML-special characters are kept.
pub fn sanitize_anchor(s: &str) -> String {
    s.chars().filter(|c| !c.is_control() || matches!(c, '\n' | '\t')).collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

fn raw_range(obj: &Map<String, Value>) -> Option<(usize, usize)> {
    let (start, end) = match obj.get("range") {
        Some(Value::Object(r)) => (r.get("start")?, r.get("end")?),
        Some(Value::Array(a)) if a.len() == 2 => (&a[0], &a[1]),
        _ => (obj.get("start")?, obj.get("end")?),
    };
    Some((start.as_u64()? as usize, end.as_u64()? as usize))
}

fn validate_suggestion(value: &Value, limits: &SchemaLimits) -> Result<Suggestion, String> {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(s) => return suggestion_text(s, limits).map(Suggestion::new),
        _ => return Err("suggestion is not an object".into()),
    };
    let text = suggestion_text(str_field(obj, &["text"]).ok_or("suggestion has no `text`")?, limits)?;
    let mut suggestion = Suggestion::new(text);
    if let Some(rationale) = str_field(obj, &["rationale"]) {
        let rationale = truncate_chars(&sanitize_display(rationale), limits.max_message_chars);
        if !rationale.is_empty() {
            suggestion.rationale = Some(rationale);
        }
    }
    suggestion.confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0));
    suggestion.is_preferred = obj
        .get("isPreferred")
        .or_else(|| obj.get("is_preferred"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(suggestion)
}

fn suggestion_text(raw: &str, limits: &SchemaLimits) -> Result<String, String> {
    let text = sanitize_display(raw);
    if text.is_empty() {
        return Err("suggestion text is empty".into());
    }
    let len = text.chars().count();
    if len > limits.max_suggestion_chars {
        return Err(format!("suggestion text of {} chars exceeds {}", len, limits.max_suggestion_chars));
    }
    Ok(text)
}

fn validate_issue(value: &Value, limits: &SchemaLimits, report: &mut ValidationReport) -> Result<ValidatedIssue, String> {
    let Value::Object(obj) = value else {
        return Err("issue is not an object".into());
    };

    let severity = str_field(obj, &["severity"])
        .ok_or("missing `severity`")?
        .parse::<Severity>()?;
    let category = str_field(obj, &["category"])
        .ok_or("missing `category`")?
        .parse::<Category>()?;

    let message = sanitize_display(str_field(obj, &["message"]).ok_or("missing `message`")?);
    let message = truncate_chars(message.trim(), limits.max_message_chars);
    if message.is_empty() {
        return Err("`message` is empty".into());
    }

    let quote = sanitize_anchor(str_field(obj, &["quote"]).ok_or("missing `quote`")?);
    if quote.is_empty() {
        return Err("`quote` is empty".into());
    }
    let quote_len = quote.chars().count();
    if quote_len > limits.max_quote_chars {
        return Err(format!("`quote` of {} chars exceeds {}", quote_len, limits.max_quote_chars));
    }
    let before = tail_chars(&sanitize_anchor(str_field(obj, &["before"]).unwrap_or("")), limits.max_context_chars);
    let after = truncate_chars(&sanitize_anchor(str_field(obj, &["after"]).unwrap_or("")), limits.max_context_chars);

    let nth = match obj.get("nth") {
        None | Some(Value::Null) => 1,
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => (n as usize).min(MAX_NTH),
            _ => {
                debug!("Repairing invalid `nth` value {} to 1.", v);
                1
            }
        },
    };

    let mut anchor = Anchor::new(quote, before, after, nth);
    anchor.raw_range = raw_range(obj);

    let mut suggestions = Vec::new();
    if let Some(Value::Array(items)) = obj.get("suggestions") {
        for item in items {
            if suggestions.len() >= limits.max_suggestions {
                report.dropped_suggestions += 1;
                continue;
            }
            match validate_suggestion(item, limits) {
                Ok(s) => suggestions.push(s),
                Err(e) => {
                    debug!("SCHEMA_VALIDATION_FAILURE: dropping suggestion: {}", e);
                    report.dropped_suggestions += 1;
                    report.errors.push(e);
                }
            }
        }
    }

    let id = str_field(obj, &["id"])
        .map(sanitize_display)
        .filter(|s| !s.is_empty());

    Ok(ValidatedIssue { id, severity, category, message, anchor, suggestions })
}

/// Validates a decoded payload of the form `{"issues": [...]}` (a bare array is accepted).
pub fn validate_response(payload: &Value, limits: &SchemaLimits) -> ValidationReport {
    let mut report = ValidationReport::default();
    let items = match payload {
        Value::Object(obj) => match obj.get("issues") {
            Some(Value::Array(items)) => items,
            _ => {
                record_unusable(&mut report, "response has no `issues` array".into());
                return report;
            }
        },
        Value::Array(items) => items,
        _ => {
            record_unusable(&mut report, "response is not a JSON object".into());
            return report;
        }
    };

    for (index, item) in items.iter().enumerate() {
        if report.issues.len() >= limits.max_issues {
            report.dropped_issues += items.len() - index;
            debug!("Issue cap of {} reached; dropping the remaining {}.", limits.max_issues, items.len() - index);
            break;
        }
        match validate_issue(item, limits, &mut report) {
            Ok(issue) => report.issues.push(issue),
            Err(e) => {
                warn!("SCHEMA_VALIDATION_FAILURE: dropping issue #{}: {}", index, e);
                report.dropped_issues += 1;
                report.errors.push(format!("issue #{}: {}", index, e));
            }
        }
    }

    if !items.is_empty() && report.issues.is_empty() {
        record_unusable(&mut report, format!("none of the {} issue(s) in the response were valid", items.len()));
    }
    report
}
