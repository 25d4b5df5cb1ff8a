// kousei-core/src/lib.rs
//! # Kousei Core Library
//!
//! `kousei-core` detects and corrects issues in Japanese text. Deterministic pattern rules
//! and an external LLM both produce [`Issue`]s over the same text; fixes are applied with
//! offset-safe splicing and recorded in an undo/redo history.
//!
//! All offsets are UTF-8 byte offsets on `char` boundaries. [`TextRange::char_range`] and
//! [`TextRange::utf16_range`] convert for consumers that count differently.
//!
//! ## Modules
//!
//! * `config`: Rule file format, embedded presets, and the analysis/LLM/schema settings.
//! * `rules`: Rule compilation and the memoizing [`RuleManager`] service.
//! * `engine` / `engines`: The [`AnalysisEngine`] trait and the rule-matching [`RuleEngine`].
//! * `guards`: Secret rejection, PII masking and prompt sanitization ahead of any LLM call.
//! * `llm`: The [`LlmClient`] trait, an HTTP client, retries, cancellation and health checks.
//! * `reconcile`: LLM JSON extraction, schema validation and anchor resolution.
//! * `analyzer`: Guarded LLM analysis of passages, plus streamed chunked analysis.
//! * `fix`: Safe auto-fix selection, fix application and the history log.
//! * `session`: A document with its issues and undo/redo.
//! * `headless`: The two-call `analyze` / `apply_fixes` surface.
//!
//! ## Usage Example
//!
//! ```rust
//! use kousei_core::{analyze, apply_fixes, AnalysisConfig, Preset, RuleManager};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let rules = RuleManager::from_preset(Preset::Standard)?;
//!     let text = "サーバーに接続して下さい。";
//!
//!     let issues = analyze(&rules, text, &AnalysisConfig::default());
//!     let (fixed, summary) = apply_fixes(text, &issues);
//!
//!     assert_eq!(fixed, "サーバに接続してください。");
//!     assert_eq!(summary.applied_count, 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible core operations return [`KouseiError`], whose [`KouseiError::code`] gives a
//! stable code such as `STALE_RANGE`. File loading uses `anyhow::Result` with context.
//! Bulk operations never fail as a whole for one item: they report itemized failures.
//!
//! ---
//! License: MIT OR APACHE 2.0

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod engines;
pub mod errors;
pub mod fix;
pub mod guards;
pub mod headless;
pub mod issue;
pub mod llm;
pub mod reconcile;
pub mod redaction;
pub mod rules;
pub mod session;
pub mod validators;

/// Re-exports the configuration types and rule source helpers.
pub use config::{
    load_source_by_name, merge_sources, AnalysisConfig, LlmConfig, Preset, RuleDefinition, RuleSource,
    SchemaLimits, SourceMetadata, MAX_PATTERN_LENGTH,
};

pub use errors::KouseiError;

pub use issue::{
    merge_issue_sets, sort_issues, Category, Issue, IssueMetadata, IssueSet, IssueSource, Severity, Suggestion,
    TextRange,
};

pub use engine::{AnalysisEngine, AnalysisReport};
pub use engines::rule_engine::RuleEngine;
pub use rules::{compile, compile_rules, CompiledRule, CompiledRules, RuleManager, RulePattern};

pub use guards::{GuardedText, PiiMasker, PromptSanitizer, SecretRejector, SecurityGuards};
pub use redaction::{redact_sensitive, PiiMatch, SecretMatch, SensitiveMatch};

pub use llm::{CancellationToken, HealthMonitor, HttpLlmClient, LlmClient, LlmError, RetryPolicy, RetryingClient};
pub use reconcile::{reconcile_response, try_reconcile_response, Anchor, Resolution, ResolutionMethod};
pub use analyzer::{chunk_text, LlmAnalysis, LlmAnalyzer, Passage, StreamEvent, WritingStyle};

pub use fix::{
    is_auto_fix_eligible, ApplyOutcome, AppliedFix, AutoFixSummary, FailedFix, History, HistoryAction, HistoryEntry,
};
pub use session::ProofreadingSession;

/// Re-exports the one-shot API.
pub use headless::{analyze, apply_fixes};
