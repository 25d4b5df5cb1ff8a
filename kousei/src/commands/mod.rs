// kousei/src/commands/mod.rs
//! Subcommand implementations and the input/rule plumbing they share.
//! License: MIT OR APACHE 2.0

pub mod check;
pub mod fix;
pub mod guard;
pub mod rules;

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use kousei_core::{AnalysisConfig, RuleManager};

use crate::cli::RuleArgs;

/// Exit code when `--fail-on` trips.
pub const EXIT_FINDINGS: u8 = 1;
/// Exit code when the guards refuse the input.
pub const EXIT_REJECTED: u8 = 2;

/// Reads the whole input from `path`, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            debug!("Reading input from {}", path.display());
            fs::read_to_string(path).with_context(|| format!("Failed to read input file {}", path.display()))
        }
        None => {
            debug!("Reading input from stdin");
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

/// Builds the rule manager for `args`: the preset, then each `--rules` source in order.
/// Rules that fail to compile are logged and skipped.
pub fn build_rule_manager(args: &RuleArgs) -> Result<RuleManager> {
    let mut manager = RuleManager::from_preset(args.preset)?;
    for name in &args.rules {
        manager = manager
            .with_source_named(name)
            .with_context(|| format!("Failed to load rule source '{}'", name))?;
    }
    manager.ensure_initialized();
    for error in manager.compile_errors() {
        warn!("Skipping rule: {}", error);
    }
    Ok(manager)
}

/// Turns the filtering flags into an [`AnalysisConfig`].
pub fn analysis_config(args: &RuleArgs) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    if !args.category.is_empty() {
        config.enabled_categories = args.category.clone();
    }
    config.exclude_rule_ids = args.exclude.clone();
    if let Some(max_issues) = args.max_issues {
        config.max_issues = max_issues;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config
}
