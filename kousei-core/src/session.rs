//! session.rs - A single document under proofreading.
//!
//! A [`ProofreadingSession`] owns the text, its current issue set and the undo log. Every
//! committed change pushes a snapshot, and undo/redo always restore text and issues
//! together. The session is single-writer; callers sharing one across tasks must provide
//! their own locking.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, info};

use crate::config::AnalysisConfig;
use crate::engine::{AnalysisEngine, AnalysisReport};
use crate::engines::rule_engine::RuleEngine;
use crate::fix::history::DEFAULT_HISTORY_CAPACITY;
use crate::fix::{self, ApplyOutcome, AutoFixSummary, History, HistoryAction, HistoryEntry};
use crate::issue::{merge_issue_sets, IssueSet, IssueSource};

pub struct ProofreadingSession {
    text: String,
    issues: IssueSet,
    history: History,
    engine: RuleEngine,
    config: AnalysisConfig,
}

impl ProofreadingSession {
    pub fn new(text: impl Into<String>, engine: RuleEngine, config: AnalysisConfig) -> Self {
        Self::with_history_capacity(text, engine, config, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(
        text: impl Into<String>,
        engine: RuleEngine,
        config: AnalysisConfig,
        capacity: usize,
    ) -> Self {
        let text = text.into();
        let initial = HistoryEntry::new(text.clone(), IssueSet::new(), HistoryAction::Initial, "Opened document");
        Self {
            text,
            issues: IssueSet::new(),
            history: History::new(initial, capacity),
            engine,
            config,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn issues(&self) -> &IssueSet {
        &self.issues
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn commit(&mut self, text: String, issues: IssueSet, action: HistoryAction, description: String) {
        debug!("Session commit: {:?} ({}).", action, description);
        self.history
            .push(HistoryEntry::new(text.clone(), issues.clone(), action, description));
        self.text = text;
        self.issues = issues;
    }

    fn restore_current(&mut self) {
        if let Some(entry) = self.history.current() {
            self.text = entry.text.clone();
            self.issues = entry.issues.clone();
        }
    }

    /// Re-runs the rules. LLM issues that still match the text are kept alongside.
    pub fn analyze_with_rules(&mut self) -> AnalysisReport {
        let report = self.engine.analyze(&self.text, &self.config);
        let llm_issues: IssueSet = self
            .issues
            .iter()
            .filter(|i| i.source == IssueSource::Llm && !i.is_stale(&self.text))
            .cloned()
            .collect();
        let merged = merge_issue_sets(report.issues.clone(), llm_issues);
        let description = format!("Rules found {} issue(s)", report.issues.len());
        self.commit(self.text.clone(), merged, HistoryAction::Analyze, description);
        report
    }

    /// Adds externally produced issues, typically from the LLM analyzer.
    pub fn add_issues(&mut self, issues: IssueSet) {
        let count = issues.len();
        let rules: IssueSet = self.issues.iter().filter(|i| i.source == IssueSource::Rule).cloned().collect();
        let mut llm: IssueSet = self.issues.iter().filter(|i| i.source == IssueSource::Llm).cloned().collect();
        llm.extend(issues);
        let merged = merge_issue_sets(rules, llm);
        self.commit(self.text.clone(), merged, HistoryAction::Analyze, format!("Added {} issue(s)", count));
    }

    /// Replaces the text. Issues whose span no longer matches are dropped.
    pub fn edit_text(&mut self, new_text: impl Into<String>) {
        let new_text = new_text.into();
        let kept: IssueSet = self.issues.iter().filter(|i| !i.is_stale(&new_text)).cloned().collect();
        let dropped = self.issues.len() - kept.len();
        self.commit(
            new_text,
            kept,
            HistoryAction::ManualEdit,
            format!("Manual edit ({} issue(s) invalidated)", dropped),
        );
    }

    /// Removes one issue. Returns false when no issue has that id.
    pub fn dismiss_issue(&mut self, issue_id: &str) -> bool {
        if !self.issues.iter().any(|i| i.id == issue_id) {
            return false;
        }
        let remaining: IssueSet = self.issues.iter().filter(|i| i.id != issue_id).cloned().collect();
        self.commit(self.text.clone(), remaining, HistoryAction::DismissIssue, format!("Dismissed {}", issue_id));
        true
    }

    pub fn clear(&mut self) {
        self.commit(String::new(), IssueSet::new(), HistoryAction::Clear, "Cleared document".to_string());
    }

    pub fn apply_suggestion(&mut self, issue_id: &str, suggestion_index: usize) -> ApplyOutcome {
        match fix::apply_suggestion(&self.text, &self.issues, issue_id, suggestion_index) {
            Ok((text, issues, applied)) => {
                let outcome = ApplyOutcome {
                    success: true,
                    applied_text: Some(applied.applied_text.clone()),
                    original_text: Some(applied.original_text.clone()),
                    error: None,
                };
                let description = format!("Applied suggestion {} of {}", suggestion_index, issue_id);
                self.commit(text, issues, HistoryAction::ApplySuggestion, description);
                outcome
            }
            Err(e) => {
                info!("Could not apply suggestion for '{}': {}", issue_id, e);
                ApplyOutcome {
                    success: false,
                    error: Some(e.code().to_string()),
                    ..Default::default()
                }
            }
        }
    }

    /// Bulk-applies safe fixes. Nothing is committed when nothing was applied.
    pub fn apply_all_auto_fixes(&mut self) -> AutoFixSummary {
        let (text, issues, summary) = fix::apply_all_auto_fixes(&self.text, &self.issues);
        if summary.applied_count > 0 {
            self.commit(text, issues, HistoryAction::ApplyAllAutoFixes, summary.message.clone());
        }
        summary
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        if self.history.undo().is_none() {
            return false;
        }
        self.restore_current();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.history.redo().is_none() {
            return false;
        }
        self.restore_current();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleDefinition, RuleSource, SourceMetadata};
    use crate::issue::{Category, Severity};
    use crate::rules::RuleManager;

    fn engine() -> RuleEngine {
        let source = RuleSource {
            metadata: SourceMetadata::default(),
            rules: vec![
                RuleDefinition {
                    id: "ra-nuki-taberu".into(),
                    severity: "warn".into(),
                    category: "style".into(),
                    pattern: Some("食べれる".into()),
                    message: "ら抜き言葉です".into(),
                    auto_fix: true,
                    replacement: Some("食べられる".into()),
                    ..Default::default()
                },
                RuleDefinition {
                    id: "risky-word".into(),
                    severity: "error".into(),
                    category: "risk".into(),
                    pattern: Some("絶対".into()),
                    message: "断定表現".into(),
                    ..Default::default()
                },
            ],
        };
        RuleManager::new(vec![source]).engine()
    }

    fn session(text: &str) -> ProofreadingSession {
        ProofreadingSession::new(text, engine(), AnalysisConfig::default())
    }

    #[test]
    fn test_analyze_then_bulk_fix_then_undo() {
        let mut s = session("絶対に食べれる。");
        let report = s.analyze_with_rules();
        assert_eq!(report.issues.len(), 2);

        let summary = s.apply_all_auto_fixes();
        assert_eq!(summary.applied_count, 1);
        assert_eq!(s.text(), "絶対に食べられる。");
        assert_eq!(s.issues().len(), 1);
        assert_eq!(s.issues()[0].severity, Severity::Error);

        assert!(s.undo());
        assert_eq!(s.text(), "絶対に食べれる。");
        assert_eq!(s.issues().len(), 2);
        assert!(s.redo());
        assert_eq!(s.text(), "絶対に食べられる。");
    }

    #[test]
    fn test_single_apply_keeps_issue() {
        let mut s = session("食べれる");
        s.analyze_with_rules();
        let id = s.issues()[0].id.clone();
        let outcome = s.apply_suggestion(&id, 0);
        assert!(outcome.success);
        assert_eq!(outcome.original_text.as_deref(), Some("食べれる"));
        assert_eq!(s.text(), "食べられる");
        assert_eq!(s.issues().len(), 1);
        assert_eq!(s.issues()[0].current_slice(s.text()), Some("食べられる"));
    }

    #[test]
    fn test_failed_apply_reports_code_and_commits_nothing() {
        let mut s = session("食べれる");
        s.analyze_with_rules();
        let before = s.history().len();
        let outcome = s.apply_suggestion("missing", 0);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("ISSUE_NOT_FOUND"));
        assert_eq!(s.history().len(), before);
    }

    #[test]
    fn test_manual_edit_drops_stale_issues() {
        let mut s = session("絶対に食べれる。");
        s.analyze_with_rules();
        s.edit_text("絶対に食べる。");
        assert_eq!(s.issues().len(), 1);
        assert_eq!(s.issues()[0].category, Category::Risk);
    }

    #[test]
    fn test_dismiss_and_clear() {
        let mut s = session("絶対に食べれる。");
        s.analyze_with_rules();
        let id = s.issues()[0].id.clone();
        assert!(s.dismiss_issue(&id));
        assert!(!s.dismiss_issue(&id));
        assert_eq!(s.issues().len(), 1);
        s.clear();
        assert_eq!(s.text(), "");
        assert!(s.issues().is_empty());
        assert!(s.undo());
        assert_eq!(s.issues().len(), 1);
    }

    #[test]
    fn test_undo_at_start_is_false() {
        let mut s = session("本文");
        assert!(!s.can_undo());
        assert!(!s.undo());
        assert!(!s.redo());
    }
}
