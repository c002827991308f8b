//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bundle-deploy - Deploy charm bundles to a control plane.
#[derive(Parser, Debug)]
#[command(name = "bundle-deploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the bundle file.
    #[arg(short, long, global = true, env = "BUNDLE_DEPLOY_BUNDLE")]
    pub bundle: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify the bundle.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the changes deploying the bundle would apply.
    Plan {
        /// Read the change list from a file instead of building it from the bundle.
        #[arg(long)]
        changes: Option<PathBuf>,
    },

    /// Deploy the bundle.
    Deploy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Apply the change list from a file instead of building it from the bundle.
        #[arg(long)]
        changes: Option<PathBuf>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_with_globals() {
        let cli = Cli::try_parse_from([
            "bundle-deploy",
            "deploy",
            "--yes",
            "--bundle",
            "wiki.yaml",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.bundle, Some(PathBuf::from("wiki.yaml")));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Deploy {
                yes: true,
                changes: None
            }
        ));
    }

    #[test]
    fn test_parse_plan_with_changes_file() {
        let cli = Cli::try_parse_from(["bundle-deploy", "plan", "--changes", "changes.json"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Plan { changes: Some(ref path) } if path == &PathBuf::from("changes.json")
        ));
    }
}
