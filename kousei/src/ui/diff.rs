// kousei/src/ui/diff.rs
//! Console diff of original versus corrected text.
//! License: MIT OR APACHE 2.0

use diffy::{create_patch, Line as DiffLine};

use crate::ui::theme::{paint, ThemeEntry};

/// Renders a unified diff: removed lines in red, added lines in green.
pub fn render_diff(original: &str, fixed: &str, color: bool) -> String {
    let patch = create_patch(original, fixed);
    let mut out = String::new();
    out.push_str(&paint("--- original", ThemeEntry::DiffHeader, color));
    out.push('\n');
    out.push_str(&paint("+++ fixed", ThemeEntry::DiffHeader, color));
    out.push('\n');

    for hunk in patch.hunks() {
        let (old, new) = (hunk.old_range(), hunk.new_range());
        let header = format!("@@ -{},{} +{},{} @@", old.start(), old.len(), new.start(), new.len());
        out.push_str(&paint(&header, ThemeEntry::DiffHeader, color));
        out.push('\n');
        for line in hunk.lines() {
            let (marker, body, entry) = match line {
                DiffLine::Delete(s) => ("-", *s, Some(ThemeEntry::DiffRemoved)),
                DiffLine::Insert(s) => ("+", *s, Some(ThemeEntry::DiffAdded)),
                DiffLine::Context(s) => (" ", *s, None),
            };
            let body = body.strip_suffix('\n').unwrap_or(body);
            let rendered = format!("{}{}", marker, body);
            match entry {
                Some(entry) => out.push_str(&paint(&rendered, entry, color)),
                None => out.push_str(&rendered),
            }
            out.push('\n');
        }
    }

    if patch.hunks().is_empty() {
        out.push_str("No changes.\n");
    }
    out
}
