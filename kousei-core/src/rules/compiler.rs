//! compiler.rs - Turns declarative rule definitions into executable matchers.
//!
//! A pattern is matched as a literal substring unless it contains regex metacharacters,
//! in which case it is compiled as a regular expression. Compilation errors are collected
//! per rule and never abort the rest of the rule list.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, warn};
use regex::{Regex, RegexBuilder};

use crate::config::{RuleDefinition, MAX_PATTERN_LENGTH};
use crate::errors::KouseiError;
use crate::issue::{Category, Severity};

/// The matcher half of a compiled rule.
#[derive(Debug, Clone)]
pub enum RulePattern {
    Literal(String),
    Regex(Regex),
}

impl RulePattern {
    pub fn as_str(&self) -> &str {
        match self {
            RulePattern::Literal(s) => s,
            RulePattern::Regex(r) => r.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, RulePattern::Regex(_))
    }
}

/// Represents a single compiled rule, ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub severity: Severity,
    pub category: Category,
    pub pattern: RulePattern,
    pub message: String,
    pub auto_fix: bool,
    pub replacement: Option<String>,
    pub enabled: bool,
}

/// Represents a collection of all compiled rules.
#[derive(Debug, Default)]
pub struct CompiledRules {
    pub rules: Vec<CompiledRule>,
}

impl CompiledRules {
    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The outcome of compiling a rule list: the rules that compiled plus every per-rule error.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub compiled: CompiledRules,
    pub errors: Vec<KouseiError>,
}

/// True when `pattern` contains characters that only make sense as regex syntax.
pub fn has_regex_metacharacters(pattern: &str) -> bool {
    pattern.chars().any(|c| {
        matches!(
            c,
            '\\' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$'
        )
    })
}

/// Returns every `$N` group number referenced by a replacement template.
pub(crate) fn referenced_groups(template: &str) -> Vec<usize> {
    let mut groups = Vec::new();
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            continue;
        }
        if matches!(chars.peek(), Some((_, '$'))) {
            chars.next();
            continue;
        }
        let digits: String = template[i + 1..].chars().take_while(|d| d.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<usize>() {
            groups.push(n);
        }
    }
    groups
}

/// Compiles one rule definition, returning every problem found rather than the first.
pub fn compile(def: &RuleDefinition) -> Result<CompiledRule, Vec<KouseiError>> {
    let id = def.id.trim().to_string();
    let label = if id.is_empty() { "<unnamed>".to_string() } else { id.clone() };
    let mut errors = Vec::new();

    if id.is_empty() {
        errors.push(KouseiError::RuleCompile(label.clone(), "missing `id`".into()));
    }

    let severity = def
        .severity
        .parse::<Severity>()
        .map_err(|e| errors.push(KouseiError::RuleCompile(label.clone(), e)))
        .ok();
    let category = def
        .category
        .parse::<Category>()
        .map_err(|e| errors.push(KouseiError::RuleCompile(label.clone(), e)))
        .ok();

    let replacement = def.replacement.clone().filter(|r| !r.is_empty());
    if def.auto_fix && replacement.is_none() {
        errors.push(KouseiError::RuleCompile(
            label.clone(),
            "`auto_fix` is set but no `replacement` is given".into(),
        ));
    }

    let pattern = match def.pattern.as_deref() {
        None | Some("") => {
            errors.push(KouseiError::RuleCompile(label.clone(), "missing `pattern`".into()));
            None
        }
        Some(p) if p.chars().count() > MAX_PATTERN_LENGTH => {
            errors.push(KouseiError::PatternLengthExceeded(
                label.clone(),
                p.chars().count(),
                MAX_PATTERN_LENGTH,
            ));
            None
        }
        Some(p) if has_regex_metacharacters(p) => {
            debug!("Attempting to compile rule '{}' as regex '{}'", label, p);
            match RegexBuilder::new(p).size_limit(10 * (1 << 20)).build() {
                Ok(regex) => {
                    let group_count = regex.captures_len() - 1;
                    for template in replacement.iter().chain(std::iter::once(&def.message)) {
                        for group in referenced_groups(template) {
                            if group > group_count {
                                errors.push(KouseiError::RuleCompile(
                                    label.clone(),
                                    format!("template references non-existent capture group '${}'", group),
                                ));
                            }
                        }
                    }
                    Some(RulePattern::Regex(regex))
                }
                Err(e) => {
                    errors.push(KouseiError::RuleCompile(label.clone(), e.to_string()));
                    None
                }
            }
        }
        Some(p) => Some(RulePattern::Literal(p.to_string())),
    };

    match (severity, category, pattern) {
        (Some(severity), Some(category), Some(pattern)) if errors.is_empty() => Ok(CompiledRule {
            id,
            severity,
            category,
            pattern,
            message: def.message.clone(),
            auto_fix: def.auto_fix,
            replacement,
            enabled: def.enabled,
        }),
        _ => Err(errors),
    }
}

/// Compiles a list of rule definitions. Rules that fail are skipped and their errors
/// reported; the remaining rules still compile.
pub fn compile_rules(definitions: &[RuleDefinition]) -> CompileReport {
    debug!("Starting compilation of {} rules.", definitions.len());
    let mut report = CompileReport::default();

    for def in definitions {
        match compile(def) {
            Ok(rule) => {
                debug!(target: "kousei_core::compiler", "Rule '{}' compiled successfully.", rule.id);
                report.compiled.rules.push(rule);
            }
            Err(errors) => {
                for e in &errors {
                    warn!("RULE_COMPILE_ERROR: {}", e);
                }
                report.errors.extend(errors);
            }
        }
    }

    debug!(
        "Finished compiling rules. Compiled: {}, failed with {} error(s).",
        report.compiled.len(),
        report.errors.len()
    );
    report
}
