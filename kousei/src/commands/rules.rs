// kousei/src/commands/rules.rs
//! `kousei rules`: list the rules a preset and rule files resolve to.
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Write};
use std::process::ExitCode;

use kousei_core::CompiledRule;

use crate::cli::RulesCommand;
use crate::commands::build_rule_manager;
use crate::ui::rules_table::rules_table;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleEntry<'a> {
    id: &'a str,
    severity: &'static str,
    category: &'static str,
    pattern: &'a str,
    regex: bool,
    auto_fix: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    replacement: Option<&'a str>,
    message: &'a str,
}

impl<'a> From<&'a CompiledRule> for RuleEntry<'a> {
    fn from(rule: &'a CompiledRule) -> Self {
        Self {
            id: &rule.id,
            severity: rule.severity.as_str(),
            category: rule.category.as_str(),
            pattern: rule.pattern.as_str(),
            regex: rule.pattern.is_regex(),
            auto_fix: rule.auto_fix,
            replacement: rule.replacement.as_deref(),
            message: &rule.message,
        }
    }
}

pub fn run_rules(cmd: &RulesCommand) -> Result<ExitCode> {
    let manager = build_rule_manager(&cmd.rules)?;
    let compiled = manager.compiled();
    let active: Vec<CompiledRule> = compiled
        .rules
        .iter()
        .filter(|r| r.enabled && !cmd.rules.exclude.contains(&r.id))
        .filter(|r| cmd.rules.category.is_empty() || cmd.rules.category.contains(&r.category))
        .cloned()
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cmd.json {
        let entries: Vec<RuleEntry> = active.iter().map(RuleEntry::from).collect();
        serde_json::to_writer_pretty(&mut out, &entries).context("Failed to write JSON output")?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", rules_table(&active))?;
        writeln!(out, "{} rule(s) from preset '{}'.", active.len(), cmd.rules.preset)?;
    }
    if !manager.compile_errors().is_empty() {
        eprintln!("{} rule(s) failed to compile and were skipped.", manager.compile_errors().len());
    }
    Ok(ExitCode::SUCCESS)
}
