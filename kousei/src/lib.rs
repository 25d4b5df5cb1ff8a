// kousei/src/lib.rs
//! # Kousei CLI Application
//!
//! This crate provides the terminal interface for the Kousei proofreading engine:
//! checking a document, applying safe automatic fixes, previewing what the LLM guards
//! would send, and listing the active rules.
//!
//! License: MIT OR APACHE 2.0

pub mod cli;
pub mod commands;
pub mod logger;
pub mod ui;
