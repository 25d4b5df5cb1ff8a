//! manager.rs - Owns the rule sources of one process or session and compiles them once.
//!
//! A `RuleManager` is constructed explicitly and passed by reference to whatever needs
//! rules. Compilation happens on the first call to [`RuleManager::ensure_initialized`];
//! later and concurrent calls share the same result.
//!
//! License: MIT OR APACHE 2.0

use anyhow::Result;
use log::{debug, info};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::config::{load_source_by_name, merge_sources, Preset, RuleSource};
use crate::engines::rule_engine::RuleEngine;
use crate::errors::KouseiError;
use crate::rules::compiler::{compile_rules, CompiledRules};

#[derive(Debug)]
struct CompiledState {
    rules: Arc<CompiledRules>,
    errors: Vec<KouseiError>,
}

/// Rule sources plus their lazily compiled form.
#[derive(Debug, Default)]
pub struct RuleManager {
    sources: Vec<RuleSource>,
    state: OnceCell<CompiledState>,
}

impl RuleManager {
    pub fn new(sources: Vec<RuleSource>) -> Self {
        Self { sources, state: OnceCell::new() }
    }

    /// Builds a manager over one of the embedded presets.
    pub fn from_preset(preset: Preset) -> Result<Self> {
        Ok(Self::new(preset.sources()?))
    }

    /// Appends a source that overrides every earlier source on id collisions. Any
    /// compiled state is discarded.
    pub fn with_source(mut self, source: RuleSource) -> Self {
        self.sources.push(source);
        self.state = OnceCell::new();
        self
    }

    /// Appends a source loaded from a path or by name from the rule directories.
    pub fn with_source_named(self, name_or_path: &str) -> Result<Self> {
        let source = load_source_by_name(name_or_path)?;
        Ok(self.with_source(source))
    }

    pub fn sources(&self) -> &[RuleSource] {
        &self.sources
    }

    /// Compiles the merged sources if that has not happened yet. Idempotent, and safe to
    /// call from several threads at once: only one compilation ever runs.
    pub fn ensure_initialized(&self) -> &Arc<CompiledRules> {
        &self
            .state
            .get_or_init(|| {
                let merged = merge_sources(&self.sources);
                info!(
                    "Compiling {} rules from {} source(s).",
                    merged.len(),
                    self.sources.len()
                );
                let report = compile_rules(&merged);
                debug!(
                    "Rule manager initialized with {} compiled rules and {} error(s).",
                    report.compiled.len(),
                    report.errors.len()
                );
                CompiledState {
                    rules: Arc::new(report.compiled),
                    errors: report.errors,
                }
            })
            .rules
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn compiled(&self) -> Arc<CompiledRules> {
        Arc::clone(self.ensure_initialized())
    }

    /// Per-rule compile errors from initialization.
    pub fn compile_errors(&self) -> &[KouseiError] {
        self.ensure_initialized();
        self.state.get().map(|s| s.errors.as_slice()).unwrap_or(&[])
    }

    /// Returns an engine over the compiled rules.
    pub fn engine(&self) -> RuleEngine {
        RuleEngine::new(self.compiled())
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.ensure_initialized().rules.iter().map(|r| r.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleDefinition, SourceMetadata};

    fn source(rules: Vec<(&str, &str)>) -> RuleSource {
        RuleSource {
            metadata: SourceMetadata { id: "test".into(), ..Default::default() },
            rules: rules
                .into_iter()
                .map(|(id, pattern)| RuleDefinition {
                    id: id.into(),
                    pattern: Some(pattern.into()),
                    message: "m".into(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_ensure_initialized_is_memoized() {
        let manager = RuleManager::new(vec![source(vec![("a", "x")])]);
        assert!(!manager.is_initialized());
        let first = Arc::as_ptr(manager.ensure_initialized());
        let second = Arc::as_ptr(manager.ensure_initialized());
        assert_eq!(first, second);
        assert!(manager.is_initialized());
    }

    #[test]
    fn test_concurrent_initialization_shares_result() {
        let manager = Arc::new(RuleManager::new(vec![source(vec![("a", "x"), ("b", "y")])]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                std::thread::spawn(move || Arc::as_ptr(m.ensure_initialized()) as usize)
            })
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_later_source_overrides_and_errors_are_kept() {
        let manager = RuleManager::new(vec![source(vec![("a", "x"), ("bad", "(")])])
            .with_source(source(vec![("a", "z")]));
        let compiled = manager.compiled();
        assert_eq!(compiled.get("a").unwrap().pattern.as_str(), "z");
        assert_eq!(manager.compile_errors().len(), 1);
        assert_eq!(manager.rule_ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_from_preset_compiles_cleanly() {
        for preset in [Preset::Light, Preset::Standard, Preset::Strict] {
            let manager = RuleManager::from_preset(preset).unwrap();
            assert!(manager.compile_errors().is_empty(), "{:?}", manager.compile_errors());
            assert!(!manager.compiled().is_empty());
        }
    }
}
