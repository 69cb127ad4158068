//! CLI command handlers

pub mod commands;

pub use commands::{calculate, check, formulas, suggest, validate};
