// kousei/src/cli.rs
//! This file defines the command-line interface (CLI) for the kousei application,
//! including all available commands and their arguments.
//! License: MIT OR APACHE 2.0

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use kousei_core::{Category, Preset, Severity, WritingStyle};

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "kousei",
    author = "Kousei Team",
    version = env!("CARGO_PKG_VERSION"),
    about = "Check and fix Japanese text",
    long_about = "Kousei proofreads Japanese text. Pattern rules detect grammar, honorific, consistency, style and risk issues; safe fixes can be applied automatically, and an optional LLM pass adds suggestions after secrets are rejected and personal data is masked.",
    arg_required_else_help = true,
)]
pub struct Cli {
    /// Disable informational messages
    #[arg(long, short = 'q', global = true, help = "Suppress all informational and debug messages.")]
    pub quiet: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, short = 'd', global = true, help = "Enable debug logging.")]
    pub debug: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// All available commands for the `kousei` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyzes a file or stdin and reports the issues found.
    #[command(about = "Analyze a file or stdin and report the issues found.")]
    Check(CheckCommand),

    /// Applies every safe automatic fix and prints the corrected text.
    #[command(about = "Apply every safe automatic fix and print the corrected text.")]
    Fix(FixCommand),

    /// Shows what the security guards would send to an LLM.
    #[command(about = "Show what the security guards would send to an LLM, or why they refuse.")]
    Guard(GuardCommand),

    /// Lists the rules that a preset plus rule files resolve to.
    #[command(about = "List the active rules.")]
    Rules(RulesCommand),
}

/// Rule selection and filtering, shared by every rule-driven command.
#[derive(Args, Debug, Clone)]
pub struct RuleArgs {
    /// Built-in rule tier.
    #[arg(long, short = 'p', value_name = "PRESET", default_value = "standard", help = "Built-in rule tier: light, standard or strict.")]
    pub preset: Preset,

    /// Extra rule sources; later ones win over earlier ones and over the preset.
    #[arg(long = "rules", short = 'r', value_name = "FILE|NAME", help = "Load an extra rule file (YAML) by path or name. Repeatable; later files win.")]
    pub rules: Vec<String>,

    /// Rule ids to skip (comma-separated).
    #[arg(long, short = 'x', value_delimiter = ',', value_name = "ID", help = "Skip these rule ids (comma-separated).")]
    pub exclude: Vec<String>,

    /// Restrict reporting to these categories (comma-separated).
    #[arg(long, short = 'c', value_delimiter = ',', value_name = "CATEGORY", help = "Only report these categories (comma-separated).")]
    pub category: Vec<Category>,

    /// Cap on the number of issues.
    #[arg(long = "max-issues", value_name = "N", help = "Stop after this many issues.")]
    pub max_issues: Option<usize>,

    /// Wall-clock budget for rule matching.
    #[arg(long = "timeout-ms", value_name = "MS", help = "Time budget for rule matching, in milliseconds.")]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the `check` command.
#[derive(Parser, Debug)]
pub struct CheckCommand {
    /// Path to an input file (reads from stdin if not provided).
    #[arg(value_name = "FILE", help = "Read input from a file instead of stdin.")]
    pub input_file: Option<PathBuf>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Print the report as JSON to stdout.
    #[arg(long, help = "Print the issues as JSON.")]
    pub json: bool,

    /// Exit with code 1 when an issue at or above this severity exists.
    #[arg(long = "fail-on", value_name = "SEVERITY", help = "Exit with code 1 if any issue reaches this severity (info, warn, error).")]
    pub fail_on: Option<Severity>,

    /// Also ask the LLM for suggestions.
    #[arg(long, help = "Also ask the configured LLM for suggestions.")]
    pub llm: bool,

    /// Tone the LLM should steer towards.
    #[arg(long, value_name = "STYLE", default_value = "formal", help = "Writing style for LLM suggestions: formal, casual, business or technical.")]
    pub style: WritingStyle,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long = "llm-url", value_name = "URL", env = "KOUSEI_LLM_URL", help = "Base URL of an OpenAI-compatible API.")]
    pub llm_url: Option<String>,

    /// Model name sent with every request.
    #[arg(long = "llm-model", value_name = "MODEL", env = "KOUSEI_LLM_MODEL", help = "Model name for LLM requests.")]
    pub llm_model: Option<String>,
}

/// Arguments for the `fix` command.
#[derive(Parser, Debug)]
pub struct FixCommand {
    /// Path to an input file (reads from stdin if not provided).
    #[arg(value_name = "FILE", help = "Read input from a file instead of stdin.")]
    pub input_file: Option<PathBuf>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Write the corrected text to this file instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE", help = "Write output to a specified file instead of stdout.")]
    pub output: Option<PathBuf>,

    /// Show a unified diff instead of the corrected text.
    #[arg(long, short = 'D', help = "Show a unified diff to highlight the changes made.")]
    pub diff: bool,

    /// Suppress the fix summary on stderr.
    #[arg(long = "no-summary", help = "Suppress the fix summary.")]
    pub no_summary: bool,
}

/// Arguments for the `guard` command.
#[derive(Parser, Debug)]
pub struct GuardCommand {
    /// Path to an input file (reads from stdin if not provided).
    #[arg(value_name = "FILE", help = "Read input from a file instead of stdin.")]
    pub input_file: Option<PathBuf>,

    /// Print the guard result as JSON.
    #[arg(long, help = "Print the guarded text and its masked spans as JSON.")]
    pub json: bool,

    /// Sanitized text is truncated to this many characters.
    #[arg(long = "max-input-chars", value_name = "N", default_value_t = 4000, help = "Truncate the sanitized text to this many characters.")]
    pub max_input_chars: usize,
}

/// Arguments for the `rules` command.
#[derive(Parser, Debug)]
pub struct RulesCommand {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// Print the rule list as JSON.
    #[arg(long, help = "Print the rules as JSON.")]
    pub json: bool,
}
