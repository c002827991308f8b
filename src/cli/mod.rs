//! CLI module for the bundle deployment tool.
//!
//! This module provides the command-line interface for verifying, planning
//! and deploying bundles.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
