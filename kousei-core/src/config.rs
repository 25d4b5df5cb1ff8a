//! Configuration management for `kousei-core`.
//!
//! This module defines the declarative rule file format, the embedded tiered presets, and
//! the runtime configuration structures for analysis, the LLM collaborator and schema
//! validation. Rule files are YAML; every config struct deserializes with defaults so
//! partial files are accepted.
//!
//! License: MIT OR Apache-2.0

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::issue::{Category, Severity};
use crate::llm::retry::RetryPolicy;

/// Maximum allowed length for a rule pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// A single declarative rule as written in a rule file.
///
/// `severity` and `category` stay as raw strings here; the compiler checks them against
/// the closed enums and reports bad values per rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleDefinition {
    /// Unique identifier for the rule (e.g., "ra_nuki").
    pub id: String,
    pub description: Option<String>,
    pub severity: String,
    pub category: String,
    /// Literal text, or a regular expression when it contains metacharacters.
    pub pattern: Option<String>,
    pub message: String,
    pub auto_fix: bool,
    /// Replacement template; `$1`, `$2`, ... refer to capture groups.
    pub replacement: Option<String>,
    pub enabled: bool,
    pub tags: Option<Vec<String>>,
}

impl Default for RuleDefinition {
    fn default() -> Self {
        Self {
            id: String::new(),
            description: None,
            severity: "warn".to_string(),
            category: "style".to_string(),
            pattern: None,
            message: String::new(),
            auto_fix: false,
            replacement: None,
            enabled: true,
            tags: None,
        }
    }
}

/// Header of a rule file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceMetadata {
    pub id: String,
    pub version: String,
    pub locale: String,
    pub author: String,
    pub description: Option<String>,
}

impl Default for SourceMetadata {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: "1.0.0".to_string(),
            locale: "ja-JP".to_string(),
            author: "Kousei Team".to_string(),
            description: None,
        }
    }
}

/// A rule file: metadata plus an ordered list of rule definitions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct RuleSource {
    #[serde(default)]
    pub metadata: SourceMetadata,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl RuleSource {
    /// Parses a rule source from YAML text. `origin` is only used in messages.
    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self> {
        let mut source: RuleSource = serde_yml::from_str(text)
            .with_context(|| format!("Failed to parse rule source {}", origin))?;
        if source.metadata.id.is_empty() {
            source.metadata.id = origin.to_string();
        }
        for problem in source.structural_problems() {
            warn!("Rule source '{}': {}", source.metadata.id, problem);
        }
        Ok(source)
    }

    /// Loads a rule source from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading rule source from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule file {}", path.display()))?;
        let source = Self::from_yaml_str(&text, &path.display().to_string())?;
        info!("Loaded {} rules from file {}.", source.rules.len(), path.display());
        Ok(source)
    }

    /// Lists empty and duplicate ids. These are not fatal: empty ids fail compilation
    /// individually and duplicates resolve last-writer-wins like cross-source merges.
    pub fn structural_problems(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut problems = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                problems.push(format!("rule #{} has an empty `id` field", index));
            } else if !seen.insert(rule.id.as_str()) {
                problems.push(format!("duplicate rule id '{}'; the later entry wins", rule.id));
            }
        }
        problems
    }
}

/// Merges rule sources by rule id, last writer wins.
///
/// A rule keeps the position at which its id first appeared, so a tiered preset that
/// overrides a base rule does not reorder the rule list.
pub fn merge_sources(sources: &[RuleSource]) -> Vec<RuleDefinition> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, RuleDefinition> = HashMap::new();

    for source in sources {
        debug!(
            "Merging {} rules from source '{}' (v{}).",
            source.rules.len(),
            source.metadata.id,
            source.metadata.version
        );
        for rule in &source.rules {
            if !by_id.contains_key(&rule.id) {
                order.push(rule.id.clone());
            } else {
                debug!("Rule '{}' overridden by source '{}'.", rule.id, source.metadata.id);
            }
            by_id.insert(rule.id.clone(), rule.clone());
        }
    }

    let merged: Vec<RuleDefinition> = order.into_iter().filter_map(|id| by_id.remove(&id)).collect();
    debug!("Final total rules after merge: {}", merged.len());
    merged
}

/// The embedded, cumulative rule tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Light,
    Standard,
    Strict,
}

const LIGHT_RULES: &str = include_str!("../config/presets/light.yaml");
const STANDARD_RULES: &str = include_str!("../config/presets/standard.yaml");
const STRICT_RULES: &str = include_str!("../config/presets/strict.yaml");

impl Preset {
    /// Returns the cumulative source list for this tier: light, then standard, then strict.
    pub fn sources(&self) -> Result<Vec<RuleSource>> {
        let tiers: &[(&str, &str)] = match self {
            Preset::Light => &[("light", LIGHT_RULES)],
            Preset::Standard => &[("light", LIGHT_RULES), ("standard", STANDARD_RULES)],
            Preset::Strict => &[
                ("light", LIGHT_RULES),
                ("standard", STANDARD_RULES),
                ("strict", STRICT_RULES),
            ],
        };
        tiers
            .iter()
            .map(|(name, yaml)| {
                RuleSource::from_yaml_str(yaml, name)
                    .with_context(|| format!("Failed to parse embedded preset '{}'", name))
            })
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Light => "light",
            Preset::Standard => "standard",
            Preset::Strict => "strict",
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Preset::Light),
            "standard" => Ok(Preset::Standard),
            "strict" => Ok(Preset::Strict),
            other => Err(format!("unknown preset '{}'", other)),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directories searched when a rule source is requested by name.
pub fn rule_candidate_paths(name: &str) -> Vec<PathBuf> {
    let base_dirs = vec![
        dirs::home_dir().map(|p| p.join(".kousei").join("rules")),
        dirs::config_dir().map(|p| p.join("kousei").join("rules")),
        Some(PathBuf::from("./rules")),
    ];

    base_dirs
        .into_iter()
        .flatten()
        .map(|dir| dir.join(format!("{}.yaml", name)))
        .collect()
}

/// Loads a rule source from a path, or by name from the candidate directories.
pub fn load_source_by_name(name_or_path: &str) -> Result<RuleSource> {
    let path = Path::new(name_or_path);
    let path_to_load = (if path.is_file() {
        Some(path.to_path_buf())
    } else {
        rule_candidate_paths(name_or_path).into_iter().find(|p| p.is_file())
    })
    .with_context(|| {
        format!(
            "Rule source '{}' not found. It is not a file path and was not found in the rule directories.",
            name_or_path
        )
    })?;
    RuleSource::load_from_file(path_to_load)
}

/// Budgets and filters for one rule-engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hard cap; matching stops once this many issues exist.
    pub max_issues: usize,
    /// Wall-clock budget checked before each rule starts.
    pub timeout_ms: u64,
    pub enabled_categories: Vec<Category>,
    pub enabled_severities: Vec<Severity>,
    pub exclude_rule_ids: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_issues: 500,
            timeout_ms: 5000,
            enabled_categories: Category::ALL.to_vec(),
            enabled_severities: Severity::ALL.to_vec(),
            exclude_rule_ids: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn allows(&self, rule_id: &str, severity: Severity, category: Category) -> bool {
        self.enabled_categories.contains(&category)
            && self.enabled_severities.contains(&severity)
            && !self.exclude_rule_ids.iter().any(|id| id == rule_id)
    }
}

/// Settings for the external LLM collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    pub model: String,
    /// Falls back to the `KOUSEI_LLM_API_KEY` environment variable when unset.
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    /// Streaming chunk size, in characters.
    pub chunk_size: usize,
    /// Sanitized prompt text is truncated to this many characters.
    pub max_input_chars: usize,
    pub retry: RetryPolicy,
    pub health_ttl_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_ms: 30_000,
            chunk_size: 1200,
            max_input_chars: 4000,
            retry: RetryPolicy::default(),
            health_ttl_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("KOUSEI_LLM_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Caps applied while validating raw LLM output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaLimits {
    pub max_issues: usize,
    pub max_suggestions: usize,
    pub max_message_chars: usize,
    pub max_suggestion_chars: usize,
    pub max_quote_chars: usize,
    pub max_context_chars: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_issues: 50,
            max_suggestions: 5,
            max_message_chars: 500,
            max_suggestion_chars: 200,
            max_quote_chars: 200,
            max_context_chars: 40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, message: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            pattern: Some(id.to_string()),
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn source(id: &str, rules: Vec<RuleDefinition>) -> RuleSource {
        RuleSource {
            metadata: SourceMetadata { id: id.to_string(), ..Default::default() },
            rules,
        }
    }

    #[test]
    fn test_merge_last_writer_wins_keeps_first_position() {
        let base = source("base", vec![rule("a", "base a"), rule("b", "base b")]);
        let over = source("over", vec![rule("c", "over c"), rule("a", "over a")]);
        let merged = merge_sources(&[base, over]);
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].message, "over a");
    }

    #[test]
    fn test_structural_problems_flags_duplicates() {
        let src = source("dup", vec![rule("a", "1"), rule("a", "2"), rule("", "3")]);
        let problems = src.structural_problems();
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_presets_are_cumulative() {
        let light = merge_sources(&Preset::Light.sources().unwrap());
        let standard = merge_sources(&Preset::Standard.sources().unwrap());
        let strict = merge_sources(&Preset::Strict.sources().unwrap());
        assert!(!light.is_empty());
        assert!(standard.len() > light.len());
        assert!(strict.len() > standard.len());
        for r in &light {
            assert!(standard.iter().any(|s| s.id == r.id), "standard lacks {}", r.id);
        }
    }

    #[test]
    fn test_analysis_config_filters() {
        let config = AnalysisConfig {
            enabled_categories: vec![Category::Style],
            exclude_rule_ids: vec!["skip".into()],
            ..Default::default()
        };
        assert!(config.allows("x", Severity::Warn, Category::Style));
        assert!(!config.allows("x", Severity::Warn, Category::Grammar));
        assert!(!config.allows("skip", Severity::Warn, Category::Style));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
metadata:
  id: custom
rules:
  - id: foo
    pattern: "foo"
    message: "no foo"
"#;
        let src = RuleSource::from_yaml_str(yaml, "inline").unwrap();
        assert_eq!(src.metadata.locale, "ja-JP");
        assert_eq!(src.rules[0].severity, "warn");
        assert!(src.rules[0].enabled);
    }
}
