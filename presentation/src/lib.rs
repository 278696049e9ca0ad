//! Presentation layer for padre-harness
//!
//! This crate contains the CLI definition and output formatters for
//! decoded messages and session failures.

pub mod cli;
pub mod output;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use output::console::ConsoleFormatter;
pub use output::formatter::{JsonFormatter, OutputFormatter};
