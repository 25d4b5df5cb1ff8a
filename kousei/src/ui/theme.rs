// kousei/src/ui/theme.rs
//! Fixed color palette for console output.
//!
//! Each logical output element maps to one 16-color ANSI foreground. Coloring is all or
//! nothing per stream: callers pass `enabled` after checking whether the stream is a
//! terminal.
//!
//! License: MIT OR APACHE 2.0

use owo_colors::{AnsiColors, OwoColorize};

use kousei_core::Severity;

/// The different logical parts of the output that can be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeEntry {
    Header,
    Success,
    Info,
    Warn,
    Error,
    Location,
    Original,
    Suggestion,
    DiffAdded,
    DiffRemoved,
    DiffHeader,
}

impl ThemeEntry {
    pub fn color(&self) -> AnsiColors {
        match self {
            ThemeEntry::Header => AnsiColors::BrightWhite,
            ThemeEntry::Success => AnsiColors::Green,
            ThemeEntry::Info => AnsiColors::Cyan,
            ThemeEntry::Warn => AnsiColors::Yellow,
            ThemeEntry::Error => AnsiColors::Red,
            ThemeEntry::Location => AnsiColors::BrightBlack,
            ThemeEntry::Original => AnsiColors::BrightRed,
            ThemeEntry::Suggestion => AnsiColors::BrightGreen,
            ThemeEntry::DiffAdded => AnsiColors::Green,
            ThemeEntry::DiffRemoved => AnsiColors::Red,
            ThemeEntry::DiffHeader => AnsiColors::Yellow,
        }
    }

    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Info => ThemeEntry::Info,
            Severity::Warn => ThemeEntry::Warn,
            Severity::Error => ThemeEntry::Error,
        }
    }
}

/// Renders `text` in the entry's color, or unchanged when `enabled` is false.
pub fn paint(text: &str, entry: ThemeEntry, enabled: bool) -> String {
    if enabled {
        text.color(entry.color()).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_is_plain_when_disabled() {
        assert_eq!(paint("警告", ThemeEntry::Warn, false), "警告");
    }

    #[test]
    fn paint_wraps_in_escapes_when_enabled() {
        let painted = paint("警告", ThemeEntry::Warn, true);
        assert_ne!(painted, "警告");
        assert!(painted.contains("警告"));
        assert!(painted.starts_with('\u{1b}'));
    }
}
