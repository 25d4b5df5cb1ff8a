// kousei/src/ui/mod.rs
//! Terminal output: colors, issue reports, diffs and rule tables.
//! License: MIT OR APACHE 2.0

pub mod diff;
pub mod report;
pub mod rules_table;
pub mod theme;
