//! history.rs - Bounded linear undo/redo log of `(text, issues)` snapshots.
//!
//! License: MIT OR APACHE 2.0

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::issue::IssueSet;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Initial,
    Analyze,
    ManualEdit,
    ApplySuggestion,
    ApplyAllAutoFixes,
    DismissIssue,
    Clear,
}

/// The state after one committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub issues: IssueSet,
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    pub description: String,
}

impl HistoryEntry {
    pub fn new(text: impl Into<String>, issues: IssueSet, action: HistoryAction, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            issues,
            timestamp: Utc::now(),
            action,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    capacity: usize,
}

impl History {
    /// Starts the log with `initial` as its only entry. `capacity` is at least 1.
    pub fn new(initial: HistoryEntry, capacity: usize) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Appends after the cursor, discarding any redo tail and evicting the oldest entry
    /// when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Moves back one entry and returns it.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry::new(text, IssueSet::new(), HistoryAction::ManualEdit, "edit")
    }

    #[test]
    fn test_undo_redo_walks_the_log() {
        let mut history = History::new(entry("a"), 10);
        history.push(entry("b"));
        history.push(entry("c"));
        assert_eq!(history.undo().map(|e| e.text.as_str()), Some("b"));
        assert_eq!(history.undo().map(|e| e.text.as_str()), Some("a"));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().map(|e| e.text.as_str()), Some("b"));
    }

    #[test]
    fn test_push_after_undo_truncates_redo_tail() {
        let mut history = History::new(entry("a"), 10);
        history.push(entry("b"));
        history.push(entry("c"));
        history.undo();
        history.undo();
        history.push(entry("x"));
        assert!(!history.can_redo());
        let texts: Vec<&str> = history.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "x"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(entry("0"), 3);
        for t in ["1", "2", "3", "4"] {
            history.push(entry(t));
        }
        let texts: Vec<&str> = history.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["2", "3", "4"]);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.current().map(|e| e.text.as_str()), Some("4"));
    }
}
