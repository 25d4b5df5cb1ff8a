//! Rule compilation and the rule-set service object.
//!
//! License: MIT OR APACHE 2.0

pub mod compiler;
pub mod manager;

pub use compiler::{compile, compile_rules, CompileReport, CompiledRule, CompiledRules, RulePattern};
pub use manager::RuleManager;
