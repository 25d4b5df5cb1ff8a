//! extract.rs - Locates a JSON payload inside free-form model output.
//!
//! Models wrap JSON in markdown fences, prepend apologies or append explanations. The
//! extractor tries, in order: a ```` ```json ```` fence, any fence, the whole trimmed text,
//! and finally the first balanced object or array found by bracket depth.
//!
//! License: MIT OR APACHE 2.0

use serde_json::Value;

pub fn extract_json(raw: &str) -> Option<Value> {
    fenced_block(raw, Some("json"))
        .or_else(|| fenced_block(raw, None))
        .or_else(|| serde_json::from_str(raw.trim()).ok())
        .or_else(|| balanced_value(raw, '{', '}'))
        .or_else(|| balanced_value(raw, '[', ']'))
}

/// Parses the body of the first fence. With `lang`, only fences tagged with it count.
fn fenced_block(raw: &str, lang: Option<&str>) -> Option<Value> {
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        let after_ticks = &rest[open + 3..];
        let line_end = after_ticks.find('\n')?;
        let tag = after_ticks[..line_end].trim();
        let body_and_rest = &after_ticks[line_end + 1..];
        let close = body_and_rest.find("```")?;
        let body = &body_and_rest[..close];

        let tag_ok = match lang {
            Some(lang) => tag.eq_ignore_ascii_case(lang),
            None => true,
        };
        if tag_ok {
            if let Ok(value) = serde_json::from_str(body.trim()) {
                return Some(value);
            }
        }
        rest = &body_and_rest[close + 3..];
    }
    None
}

/// Scans from the first `open` for the matching `close`, skipping string contents.
fn balanced_value(raw: &str, open: char, close: char) -> Option<Value> {
    let start = raw.find(open)?;
    let candidate = &raw[start..];
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in candidate.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return serde_json::from_str(&candidate[..i + c.len_utf8()]).ok();
                }
            }
            _ => {}
        }
    }
    None
}
