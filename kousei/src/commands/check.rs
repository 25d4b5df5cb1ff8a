// kousei/src/commands/check.rs
//! `kousei check`: analyze a document and report its issues.
//!
//! Rule issues are always computed. With `--llm` the document is also chunked and sent
//! through the guarded LLM analyzer; any failure there, including a secret in the input,
//! downgrades the run to rules only with a warning on stderr.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{info, warn};
use std::io::{self, Write};
use std::process::ExitCode;

use kousei_core::{
    chunk_text, merge_issue_sets, AnalysisConfig, AnalysisEngine, Issue, IssueSet, LlmAnalysis, LlmAnalyzer,
    LlmConfig, Severity, WritingStyle,
};

use crate::cli::CheckCommand;
use crate::commands::{analysis_config, build_rule_manager, read_input, EXIT_FINDINGS};
use crate::ui::report::{write_report, JsonReport, SeverityCounts};

pub async fn run_check(cmd: &CheckCommand) -> Result<ExitCode> {
    let text = read_input(cmd.input_file.as_deref())?;
    let manager = build_rule_manager(&cmd.rules)?;
    let config = analysis_config(&cmd.rules);

    let report = manager.engine().analyze(&text, &config);
    if let Some(err) = report.timeout_error(&config) {
        warn!("{}; results are partial.", err);
    }
    if report.truncated {
        warn!("Stopped after {} issues.", config.max_issues);
    }

    let mut failed_passages = Vec::new();
    let issues = if cmd.llm {
        let llm_config = llm_config(cmd);
        match run_llm(&llm_config, &text, cmd.style).await {
            Ok(analysis) => {
                failed_passages = analysis.failed_passages;
                let llm_issues = filter_llm_issues(analysis.issues, &config);
                merge_issue_sets(report.issues.clone(), llm_issues)
            }
            Err(e) => {
                eprintln!("LLM analysis skipped: {:#}", e);
                report.issues.clone()
            }
        }
    } else {
        report.issues.clone()
    };
    info!("check found {} issue(s).", issues.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cmd.json {
        let document = JsonReport {
            issues: &issues,
            counts: SeverityCounts::from_issues(&issues),
            matched_rule_ids: &report.matched_rule_ids,
            text_length: report.text_length,
            elapsed_ms: report.elapsed_ms,
            timed_out: report.timed_out,
            truncated: report.truncated,
            failed_passages,
        };
        serde_json::to_writer_pretty(&mut out, &document).context("Failed to write JSON report")?;
        writeln!(out)?;
    } else {
        write_report(&mut out, &text, &issues, stdout_supports_color())?;
    }
    out.flush()?;

    Ok(exit_code(&issues, cmd.fail_on))
}

fn stdout_supports_color() -> bool {
    io::stdout().is_terminal()
}

fn llm_config(cmd: &CheckCommand) -> LlmConfig {
    let mut config = LlmConfig::default();
    if let Some(url) = &cmd.llm_url {
        config.base_url = url.clone();
    }
    if let Some(model) = &cmd.llm_model {
        config.model = model.clone();
    }
    config
}

async fn run_llm(config: &LlmConfig, text: &str, style: WritingStyle) -> Result<LlmAnalysis> {
    let analyzer = LlmAnalyzer::from_config(config);
    analyzer.ensure_available().await.context("LLM endpoint is not available")?;
    let passages = chunk_text(text, config.chunk_size);
    info!("Sending {} passage(s) to {}", passages.len(), config.base_url);
    let analysis = analyzer.analyze_with_llm(&passages, style).await?;
    if !analysis.failed_passages.is_empty() {
        warn!("{} passage(s) failed LLM analysis.", analysis.failed_passages.len());
    }
    Ok(analysis)
}

/// Applies the category and severity filters that the rule engine applies to its own issues.
fn filter_llm_issues(issues: IssueSet, config: &AnalysisConfig) -> IssueSet {
    issues
        .into_iter()
        .filter(|i| config.enabled_categories.contains(&i.category) && config.enabled_severities.contains(&i.severity))
        .collect()
}

/// True when some issue is at least `fail_on`.
pub fn trips_fail_on(issues: &[Issue], fail_on: Option<Severity>) -> bool {
    fail_on.is_some_and(|threshold| issues.iter().any(|i| i.severity >= threshold))
}

fn exit_code(issues: &[Issue], fail_on: Option<Severity>) -> ExitCode {
    if trips_fail_on(issues, fail_on) {
        ExitCode::from(EXIT_FINDINGS)
    } else {
        ExitCode::SUCCESS
    }
}
