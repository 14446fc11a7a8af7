//! Display formatting for terminal output
//!
//! Formats audit entries and chain verification results for the CLI.

pub mod audit;

pub use audit::{format_entry_table, format_verification};
