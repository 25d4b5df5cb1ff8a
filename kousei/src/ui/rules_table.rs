// kousei/src/ui/rules_table.rs
//! Table view of compiled rules.
//! License: MIT OR APACHE 2.0

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use kousei_core::CompiledRule;

pub fn rules_table(rules: &[CompiledRule]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "SEVERITY", "CATEGORY", "KIND", "AUTO-FIX", "MESSAGE"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(&rule.id),
            Cell::new(rule.severity.as_str()),
            Cell::new(rule.category.as_str()),
            Cell::new(if rule.pattern.is_regex() { "regex" } else { "literal" }),
            Cell::new(if rule.auto_fix { "yes" } else { "no" }),
            Cell::new(&rule.message),
        ]);
    }
    table
}
