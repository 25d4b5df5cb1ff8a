// kousei/src/commands/fix.rs
//! `kousei fix`: apply every safe automatic fix.
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use kousei_core::{analyze, apply_fixes, AutoFixSummary};

use crate::cli::FixCommand;
use crate::commands::{analysis_config, build_rule_manager, read_input};
use crate::ui::diff::render_diff;
use crate::ui::theme::{paint, ThemeEntry};

pub fn run_fix(cmd: &FixCommand) -> Result<ExitCode> {
    let text = read_input(cmd.input_file.as_deref())?;
    let manager = build_rule_manager(&cmd.rules)?;
    let issues = analyze(&manager, &text, &analysis_config(&cmd.rules));
    let (fixed, summary) = apply_fixes(&text, &issues);
    info!("{}", summary.message);
    debug!("Fixed text is {} bytes (was {}).", fixed.len(), text.len());

    if cmd.diff {
        let rendered = render_diff(&text, &fixed, io::stdout().is_terminal());
        io::stdout().write_all(rendered.as_bytes())?;
    } else if let Some(path) = &cmd.output {
        fs::write(path, &fixed).with_context(|| format!("Failed to write output file {}", path.display()))?;
        info!("Corrected text written to {}", path.display());
    } else {
        io::stdout().write_all(fixed.as_bytes())?;
    }
    io::stdout().flush()?;

    if !cmd.no_summary {
        let stderr = io::stderr();
        write_summary(&mut stderr.lock(), &summary, stderr.is_terminal())?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes the applied and skipped fixes to `out`.
pub fn write_summary<W: Write>(out: &mut W, summary: &AutoFixSummary, color: bool) -> io::Result<()> {
    writeln!(out, "{}", paint("--- Fix Summary ---", ThemeEntry::Header, color))?;
    for fix in &summary.applied_fixes {
        writeln!(
            out,
            "  {} 「{}」 -> 「{}」",
            paint("fixed", ThemeEntry::Success, color),
            fix.original_text,
            fix.applied_text
        )?;
    }
    for failed in &summary.failed_fixes {
        writeln!(
            out,
            "  {} {} [{}] {}",
            paint("skipped", ThemeEntry::Warn, color),
            failed.issue_id,
            failed.code,
            failed.reason
        )?;
    }
    writeln!(out, "{}", summary.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kousei_core::{AppliedFix, FailedFix, TextRange};

    #[test]
    fn summary_lists_applied_and_failed() {
        let summary = AutoFixSummary {
            applied_count: 1,
            failed_count: 1,
            applied_fixes: vec![AppliedFix {
                issue_id: "a".into(),
                range: TextRange::new(0, 3),
                original_text: "下さい".into(),
                applied_text: "ください".into(),
                reanchored: false,
            }],
            failed_fixes: vec![FailedFix {
                issue_id: "b".into(),
                code: "OVERLAPPING_FIX".into(),
                reason: "overlaps an applied fix".into(),
            }],
            message: "Applied 1 fix(es); 1 failed.".into(),
        };
        let mut out = Vec::new();
        write_summary(&mut out, &summary, false).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("fixed 「下さい」 -> 「ください」"));
        assert!(out.contains("skipped b [OVERLAPPING_FIX] overlaps an applied fix"));
        assert!(out.ends_with("Applied 1 fix(es); 1 failed.\n"));
    }
}
