// kousei-core/src/engine.rs
//! Defines the core `AnalysisEngine` trait and the report it produces.
//!
//! An analysis engine takes the text under review plus a budget/filter configuration and
//! returns a position-sorted issue list. The trait decouples callers (the session, the
//! headless API, the CLI) from how issues are detected.
//!
//! License: MIT OR APACHE 2.0

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::errors::KouseiError;
use crate::issue::IssueSet;
use crate::rules::compiler::CompiledRules;

/// The outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Sorted ascending by `range.start`, ties broken by rule id.
    pub issues: IssueSet,
    /// Ids of rules that produced at least one issue, in rule order.
    pub matched_rule_ids: Vec<String>,
    pub elapsed_ms: u64,
    /// Length of the analyzed text in bytes.
    pub text_length: usize,
    /// Set when the time budget expired before every rule had run.
    pub timed_out: bool,
    /// Set when `max_issues` cut matching short.
    pub truncated: bool,
}

impl AnalysisReport {
    /// `TIMEOUT_EXCEEDED` for a run that stopped early, given the budget it ran under.
    /// The issues found before the budget ran out stay valid.
    pub fn timeout_error(&self, config: &AnalysisConfig) -> Option<KouseiError> {
        self.timed_out.then(|| KouseiError::TimeoutExceeded(config.timeout_ms))
    }
}

/// A trait that defines the core functionality of an analysis engine.
pub trait AnalysisEngine: Send + Sync {
    /// Runs every enabled rule over `text`.
    ///
    /// Failures inside a single rule are logged and skipped; analysis itself never fails.
    fn analyze(&self, text: &str, config: &AnalysisConfig) -> AnalysisReport;

    /// Returns a reference to the `CompiledRules` used by the engine.
    fn compiled_rules(&self) -> &CompiledRules;
}
