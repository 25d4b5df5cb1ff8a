// kousei/src/commands/guard.rs
//! `kousei guard`: preview the text the LLM would receive.
//!
//! Secrets make the guards refuse the whole input; the command then reports the
//! credential kinds on stderr (never their values) and exits with `EXIT_REJECTED`.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::info;
use serde_json::json;
use std::io::{self, Write};
use std::process::ExitCode;

use kousei_core::{KouseiError, SecurityGuards};

use crate::cli::GuardCommand;
use crate::commands::{read_input, EXIT_REJECTED};
use crate::ui::theme::{paint, ThemeEntry};

pub fn run_guard(cmd: &GuardCommand) -> Result<ExitCode> {
    let text = read_input(cmd.input_file.as_deref())?;
    let guards = SecurityGuards::new(cmd.max_input_chars);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match guards.prepare(&text) {
        Ok(guarded) => {
            info!("{} PII span(s) masked.", guarded.pii_matches.len());
            if cmd.json {
                serde_json::to_writer_pretty(&mut out, &guarded).context("Failed to write JSON output")?;
                writeln!(out)?;
            } else {
                writeln!(out, "{}", guarded.text)?;
                if let Some(threat) = guarded.threat_error() {
                    eprintln!(
                        "{} {} (removed from the text above)",
                        paint(threat.code(), ThemeEntry::Warn, io::stderr().is_terminal()),
                        threat
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ KouseiError::SecretDetected(_)) => {
            if cmd.json {
                let body = json!({ "error": e.code(), "message": e.to_string() });
                serde_json::to_writer_pretty(&mut out, &body).context("Failed to write JSON output")?;
                writeln!(out)?;
            }
            eprintln!("{} {}", paint(e.code(), ThemeEntry::Error, io::stderr().is_terminal()), e);
            Ok(ExitCode::from(EXIT_REJECTED))
        }
        Err(e) => Err(e.into()),
    }
}
