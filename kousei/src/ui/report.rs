// kousei/src/ui/report.rs
//! Human-readable and JSON issue reports for the `check` command.
//! License: MIT OR APACHE 2.0

use std::io::{self, Write};

use serde::Serialize;

use kousei_core::{Issue, IssueSource, Severity};

use crate::ui::theme::{paint, ThemeEntry};

/// 1-based line and character column of byte offset `at`.
pub fn line_col(text: &str, at: usize) -> (usize, usize) {
    let head = text.get(..at).unwrap_or(text);
    let line = head.matches('\n').count() + 1;
    let line_start = head.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = head[line_start..].chars().count() + 1;
    (line, column)
}

/// Formats one issue as a location line, a message line and an optional suggestion line.
pub fn render_issue(text: &str, issue: &Issue, color: bool) -> String {
    let (line, column) = line_col(text, issue.range.start);
    let severity = paint(issue.severity.as_str(), ThemeEntry::for_severity(issue.severity), color);
    let origin = match (&issue.source, &issue.metadata.rule_id) {
        (IssueSource::Rule, Some(rule_id)) => rule_id.clone(),
        (IssueSource::Rule, None) => "rule".to_string(),
        (IssueSource::Llm, _) => "llm".to_string(),
    };
    let mut out = format!(
        "{} {} [{}] {} ({})\n",
        paint(&format!("{}:{}", line, column), ThemeEntry::Location, color),
        severity,
        issue.category,
        issue.message,
        origin
    );
    let original = issue.range.slice(text).unwrap_or(issue.metadata.original_text.as_str());
    match issue.top_suggestion() {
        Some(suggestion) => {
            out.push_str(&format!(
                "    「{}」 -> 「{}」",
                paint(original, ThemeEntry::Original, color),
                paint(&suggestion.text, ThemeEntry::Suggestion, color)
            ));
            if issue.metadata.auto_fix {
                out.push_str(" (auto-fix)");
            }
            out.push('\n');
        }
        None => out.push_str(&format!("    「{}」\n", paint(original, ThemeEntry::Original, color))),
    }
    if issue.metadata.low_confidence {
        out.push_str("    (location is approximate)\n");
    }
    out
}

/// Per-severity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub warn: usize,
    pub error: usize,
}

impl SeverityCounts {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut counts = SeverityCounts::default();
        for issue in issues {
            match issue.severity {
                Severity::Info => counts.info += 1,
                Severity::Warn => counts.warn += 1,
                Severity::Error => counts.error += 1,
            }
        }
        counts
    }
}

/// Writes the issue list followed by a one-line summary.
pub fn write_report<W: Write>(out: &mut W, text: &str, issues: &[Issue], color: bool) -> io::Result<()> {
    if issues.is_empty() {
        writeln!(out, "{}", paint("No issues found.", ThemeEntry::Success, color))?;
        return Ok(());
    }
    for issue in issues {
        write!(out, "{}", render_issue(text, issue, color))?;
    }
    let counts = SeverityCounts::from_issues(issues);
    writeln!(
        out,
        "\n{}",
        paint(
            &format!(
                "{} issue(s): {} error, {} warn, {} info",
                issues.len(),
                counts.error,
                counts.warn,
                counts.info
            ),
            ThemeEntry::Header,
            color
        )
    )
}

/// The `check --json` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport<'a> {
    pub issues: &'a [Issue],
    pub counts: SeverityCounts,
    pub matched_rule_ids: &'a [String],
    pub text_length: usize,
    pub elapsed_ms: u64,
    pub timed_out: bool,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_passages: Vec<usize>,
}
