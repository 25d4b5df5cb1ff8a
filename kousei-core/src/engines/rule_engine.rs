// kousei-core/src/engines/rule_engine.rs
//! An `AnalysisEngine` implementation that runs compiled literal and regex rules.
//! License: MIT OR APACHE 2.0

use anyhow::{anyhow, Result};
use log::{debug, warn};
use regex::{Captures, Regex};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AnalysisConfig;
use crate::engine::{AnalysisEngine, AnalysisReport};
use crate::issue::{next_char_boundary, sort_issues, Issue, IssueMetadata, IssueSource, Suggestion, TextRange};
use crate::rules::compiler::{CompiledRule, CompiledRules, RulePattern};

/// Expands `$N` back-references against `caps`. `$$` yields a literal `$`. Groups that
/// did not participate in the match expand to nothing.
pub fn expand_template(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }
        let digits = after.bytes().take_while(|b| b.is_ascii_digit()).count();
        match after[..digits].parse::<usize>() {
            Ok(group) => {
                if let Some(m) = caps.get(group) {
                    out.push_str(m.as_str());
                }
                rest = &after[digits..];
            }
            Err(_) => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    compiled_rules: Arc<CompiledRules>,
}

/// Why matching stopped for the current rule.
enum Stop {
    Done,
    Full,
}

impl RuleEngine {
    pub fn new(compiled_rules: Arc<CompiledRules>) -> Self {
        Self { compiled_rules }
    }

    fn build_issue(rule: &CompiledRule, text: &str, start: usize, end: usize, caps: Option<&Captures<'_>>) -> Issue {
        let expand = |template: &str| match caps {
            Some(c) => expand_template(template, c),
            None => template.to_string(),
        };
        let suggestions = match (&rule.replacement, rule.auto_fix) {
            (Some(replacement), true) => vec![Suggestion::new(expand(replacement)).with_confidence(1.0).preferred()],
            _ => Vec::new(),
        };
        Issue {
            id: format!("rule-{}-{}-{}", rule.id, start, end),
            source: IssueSource::Rule,
            severity: rule.severity,
            category: rule.category,
            message: expand(&rule.message),
            range: TextRange::new(start, end),
            suggestions,
            metadata: IssueMetadata {
                original_text: text[start..end].to_string(),
                auto_fix: rule.auto_fix,
                confidence: Some(1.0),
                rule_id: Some(rule.id.clone()),
                ..Default::default()
            },
        }
    }

    fn match_literal(rule: &CompiledRule, needle: &str, text: &str, out: &mut Vec<Issue>, cap: usize) -> Stop {
        let mut from = 0;
        while let Some(pos) = text[from..].find(needle) {
            if out.len() >= cap {
                return Stop::Full;
            }
            let start = from + pos;
            let end = start + needle.len();
            out.push(Self::build_issue(rule, text, start, end, None));
            from = end;
        }
        Stop::Done
    }

    fn match_regex(rule: &CompiledRule, regex: &Regex, text: &str, out: &mut Vec<Issue>, cap: usize) -> Result<Stop> {
        let mut pos = 0;
        while pos <= text.len() {
            let Some(caps) = regex.captures_at(text, pos) else { break };
            let whole = caps.get(0).ok_or_else(|| anyhow!("regex capture failed"))?;
            if whole.start() == whole.end() {
                // Zero-width matches carry no span to report; step over one char.
                if whole.end() >= text.len() {
                    break;
                }
                pos = next_char_boundary(text, whole.end());
                continue;
            }
            if out.len() >= cap {
                return Ok(Stop::Full);
            }
            out.push(Self::build_issue(rule, text, whole.start(), whole.end(), Some(&caps)));
            pos = whole.end();
        }
        Ok(Stop::Done)
    }
}

impl AnalysisEngine for RuleEngine {
    fn analyze(&self, text: &str, config: &AnalysisConfig) -> AnalysisReport {
        let started = Instant::now();
        let budget = Duration::from_millis(config.timeout_ms);
        let mut report = AnalysisReport { text_length: text.len(), ..Default::default() };

        for rule in &self.compiled_rules.rules {
            if !rule.enabled || !config.allows(&rule.id, rule.severity, rule.category) {
                continue;
            }
            if started.elapsed() >= budget {
                report.timed_out = true;
                if let Some(err) = report.timeout_error(config) {
                    warn!("{}: {}; first skipped rule is '{}'.", err.code(), err, rule.id);
                }
                break;
            }

            let before = report.issues.len();
            let outcome = match &rule.pattern {
                RulePattern::Literal(needle) => Ok(Self::match_literal(rule, needle, text, &mut report.issues, config.max_issues)),
                RulePattern::Regex(regex) => Self::match_regex(rule, regex, text, &mut report.issues, config.max_issues),
            };
            let found = report.issues.len() - before;
            if found > 0 {
                debug!("Rule '{}' produced {} issue(s).", rule.id, found);
                report.matched_rule_ids.push(rule.id.clone());
            }

            match outcome {
                Ok(Stop::Done) => {}
                Ok(Stop::Full) => {
                    debug!("max_issues ({}) reached while running rule '{}'.", config.max_issues, rule.id);
                    report.truncated = true;
                    break;
                }
                Err(e) => warn!("Rule '{}' failed during matching and was skipped: {}", rule.id, e),
            }
        }

        sort_issues(&mut report.issues);
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            "Analysis finished: {} issue(s) from {} rule(s) in {} ms.",
            report.issues.len(),
            report.matched_rule_ids.len(),
            report.elapsed_ms
        );
        report
    }

    fn compiled_rules(&self) -> &CompiledRules {
        &self.compiled_rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleDefinition;
    use crate::issue::{Category, Severity};
    use crate::rules::compiler::compile_rules;

    fn engine(defs: Vec<RuleDefinition>) -> RuleEngine {
        let report = compile_rules(&defs);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        RuleEngine::new(Arc::new(report.compiled))
    }

    fn rule(id: &str, pattern: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.into(),
            pattern: Some(pattern.into()),
            message: format!("{} hit", id),
            ..Default::default()
        }
    }

    fn fix_rule(id: &str, pattern: &str, replacement: &str) -> RuleDefinition {
        RuleDefinition {
            auto_fix: true,
            replacement: Some(replacement.into()),
            ..rule(id, pattern)
        }
    }

    #[test]
    fn test_literal_rule_example() {
        let e = engine(vec![fix_rule("ra", "食べれる", "食べられる")]);
        let text = "食べれる";
        let report = e.analyze(text, &AnalysisConfig::default());
        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.range, TextRange::new(0, text.len()));
        assert_eq!(issue.range.char_range(text), (0, 4));
        assert_eq!(issue.suggestions[0].text, "食べられる");
        assert_eq!(issue.metadata.original_text, "食べれる");
        assert_eq!(report.matched_rule_ids, vec!["ra".to_string()]);
    }

    #[test]
    fn test_regex_backreferences_expand_in_suggestion_and_message() {
        let mut d = fix_rule("ra", "(見|食べ)れる", "$1られる");
        d.message = "「$1られる」".into();
        let e = engine(vec![d]);
        let report = e.analyze("見れる。食べれる。", &AnalysisConfig::default());
        let texts: Vec<&str> = report.issues.iter().map(|i| i.suggestions[0].text.as_str()).collect();
        assert_eq!(texts, vec!["見られる", "食べられる"]);
        assert_eq!(report.issues[1].message, "「食べられる」");
    }

    #[test]
    fn test_literal_template_is_not_expanded() {
        let e = engine(vec![fix_rule("lit", "abc", "$1x")]);
        let report = e.analyze("abc", &AnalysisConfig::default());
        assert_eq!(report.issues[0].suggestions[0].text, "$1x");
    }

    #[test]
    fn test_zero_width_matches_terminate() {
        let e = engine(vec![rule("empty", "x*")]);
        let report = e.analyze("あxxいx", &AnalysisConfig::default());
        let slices: Vec<&str> = report.issues.iter().map(|i| i.metadata.original_text.as_str()).collect();
        assert_eq!(slices, vec!["xx", "x"]);
    }

    #[test]
    fn test_sorted_by_start_then_rule_id() {
        let e = engine(vec![rule("zeta", "い"), rule("alpha", "い"), rule("beta", "あ")]);
        let report = e.analyze("あい", &AnalysisConfig::default());
        let ids: Vec<&str> = report.issues.iter().filter_map(|i| i.metadata.rule_id.as_deref()).collect();
        assert_eq!(ids, vec!["beta", "alpha", "zeta"]);
    }

    #[test]
    fn test_max_issues_stops_early() {
        let e = engine(vec![rule("a", "a"), rule("b", "b")]);
        let config = AnalysisConfig { max_issues: 2, ..Default::default() };
        let report = e.analyze("aaab", &config);
        assert_eq!(report.issues.len(), 2);
        assert!(report.truncated);
        assert_eq!(report.matched_rule_ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_zero_budget_admits_no_rules() {
        let e = engine(vec![rule("a", "a")]);
        let config = AnalysisConfig { timeout_ms: 0, ..Default::default() };
        let report = e.analyze("aaa", &config);
        assert!(report.timed_out);
        assert!(report.issues.is_empty());
        let err = report.timeout_error(&config).unwrap();
        assert_eq!(err.code(), "TIMEOUT_EXCEEDED");
        assert!(err.to_string().contains("0 ms"));

        let finished = e.analyze("aaa", &AnalysisConfig::default());
        assert!(finished.timeout_error(&AnalysisConfig::default()).is_none());
    }

    #[test]
    fn test_filters_and_disabled_rules() {
        let mut disabled = rule("off", "a");
        disabled.enabled = false;
        let mut grammar = rule("g", "a");
        grammar.category = "grammar".into();
        let mut err = rule("e", "a");
        err.severity = "error".into();
        let e = engine(vec![disabled, grammar, err, rule("excluded", "a")]);
        let config = AnalysisConfig {
            enabled_categories: vec![Category::Style],
            enabled_severities: vec![Severity::Warn],
            exclude_rule_ids: vec!["excluded".into()],
            ..Default::default()
        };
        assert!(e.analyze("a", &config).issues.is_empty());
    }

    #[test]
    fn test_expand_template_edge_cases() {
        let re = Regex::new("(a)(b)?").unwrap();
        let caps = re.captures("a").unwrap();
        assert_eq!(expand_template("[$1][$2][$$1][$x]", &caps), "[a][][$1][$x]");
    }
}
