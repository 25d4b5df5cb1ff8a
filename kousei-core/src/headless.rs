//! headless.rs - The two-call surface for consumers that do not keep a session.
//!
//! License: MIT OR APACHE 2.0

use crate::config::AnalysisConfig;
use crate::engine::AnalysisEngine;
use crate::fix::{self, AutoFixSummary};
use crate::issue::IssueSet;
use crate::rules::RuleManager;

/// Runs the manager's rules over `text`.
pub fn analyze(rules: &RuleManager, text: &str, config: &AnalysisConfig) -> IssueSet {
    rules.engine().analyze(text, config).issues
}

/// Applies every safe auto-fix among `issues` and returns the new text with a summary.
pub fn apply_fixes(text: &str, issues: &IssueSet) -> (String, AutoFixSummary) {
    let (new_text, _remaining, summary) = fix::apply_all_auto_fixes(text, issues);
    (new_text, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;

    #[test]
    fn test_analyze_then_apply_fixes() {
        let rules = RuleManager::from_preset(Preset::Standard).unwrap();
        let text = "サーバーに接続して下さい。";
        let issues = analyze(&rules, text, &AnalysisConfig::default());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.range.is_valid_for(text)));

        let (fixed, summary) = apply_fixes(text, &issues);
        assert_eq!(fixed, "サーバに接続してください。");
        assert_eq!(summary.applied_count, 2);
        assert_eq!(summary.failed_count, 0);
    }

    #[test]
    fn test_grammar_fixes_are_not_bulk_applied() {
        let rules = RuleManager::from_preset(Preset::Light).unwrap();
        let text = "朝早く起きれる。";
        let issues = analyze(&rules, text, &AnalysisConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].suggestions[0].text, "起きられる");
        let (fixed, summary) = apply_fixes(text, &issues);
        assert_eq!(fixed, text);
        assert_eq!(summary.applied_count, 0);
    }
}
