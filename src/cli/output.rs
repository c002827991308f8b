//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::bundle::{BundleData, ValidationResult};
use crate::changes::{Change, ChangeKind, ChangeRecord, Outcome};
use crate::deployer::DeploymentReport;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Change")]
    method: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of verifying a bundle.
    #[must_use]
    pub fn format_validation(
        &self,
        bundle: &BundleData,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "services": bundle.services.len(),
                "machines": bundle.machines.len(),
                "relations": bundle.relations.len(),
                "units": bundle.total_units(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Bundle is valid\n", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nBundle summary:\n");
                if let Some(series) = &bundle.series {
                    let _ = writeln!(output, "   Series: {series}");
                }
                let _ = writeln!(output, "   Services: {}", bundle.services.len());
                let _ = writeln!(output, "   Units: {}", bundle.total_units());
                let _ = writeln!(output, "   Machines: {}", bundle.machines.len());
                let _ = writeln!(output, "   Relations: {}", bundle.relations.len());
                output
            }
        }
    }

    /// Formats a change list for display.
    #[must_use]
    pub fn format_plan(&self, bundle_hash: Option<&str>, changes: &[Change]) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::new(bundle_hash, changes)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(bundle_hash, changes),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(bundle_hash: Option<&str>, changes: &[Change]) -> String {
        if changes.is_empty() {
            return format!("{} Nothing to deploy.\n", "✓".green());
        }

        let mut output = String::from("\nDeployment Plan\n");
        if let Some(hash) = bundle_hash {
            let _ = write!(output, "   Bundle hash: {}\n\n", &hash[..8.min(hash.len())]);
        } else {
            output.push('\n');
        }

        let rows: Vec<ChangeRow> = changes
            .iter()
            .map(|c| ChangeRow {
                id: c.id.clone(),
                method: Self::format_method(c),
                description: Self::truncate(&c.description(), 60),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let count = |kind: ChangeKind| changes.iter().filter(|c| c.kind() == Some(kind)).count();
        let _ = write!(
            output,
            "\nPlan: {} charms, {} services, {} machines, {} units, {} relations\n",
            count(ChangeKind::AddCharm).to_string().green(),
            count(ChangeKind::AddService).to_string().green(),
            count(ChangeKind::AddMachine).to_string().green(),
            count(ChangeKind::AddUnit).to_string().green(),
            count(ChangeKind::AddRelation).to_string().green(),
        );

        output
    }

    /// Formats a deployment report.
    #[must_use]
    pub fn format_report(&self, report: &DeploymentReport, progress: &[String]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ReportJson { report, progress })
                .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Deployment complete\n\n", "✓".green());

                if !report.outcomes.is_empty() {
                    let rows: Vec<OutcomeRow> = report
                        .outcomes
                        .iter()
                        .map(|o| OutcomeRow {
                            id: o.id.clone(),
                            outcome: Self::format_outcome(&o.outcome),
                            result: o.result.clone(),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                let _ = write!(
                    output,
                    "\n{} changed, {} already in place\n",
                    report.modified().to_string().green(),
                    report.reused().to_string().dimmed(),
                );
                output
            }
        }
    }

    /// Formats a change method with color.
    fn format_method(change: &Change) -> String {
        match change.kind() {
            Some(ChangeKind::AddRelation | ChangeKind::SetAnnotations) => {
                change.method().cyan().to_string()
            }
            Some(_) => change.method().green().to_string(),
            None => change.method().red().to_string(),
        }
    }

    /// Formats an outcome with color.
    fn format_outcome(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Reused | Outcome::AlreadyRelated => outcome.to_string().dimmed().to_string(),
            Outcome::Upgraded { .. } => outcome.to_string().yellow().to_string(),
            _ => outcome.to_string().green().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson {
    bundle_hash: Option<String>,
    change_count: usize,
    changes: Vec<ChangeRecord>,
}

#[derive(Serialize)]
struct ReportJson<'a> {
    #[serde(flatten)]
    report: &'a DeploymentReport,
    progress: &'a [String],
}

impl PlanJson {
    fn new(bundle_hash: Option<&str>, changes: &[Change]) -> Self {
        Self {
            bundle_hash: bundle_hash.map(str::to_string),
            change_count: changes.len(),
            changes: changes.iter().map(ChangeRecord::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{AddCharmParams, ChangeParams};

    fn charm_change() -> Change {
        Change::new(
            "addCharm-0",
            ChangeParams::AddCharm(AddCharmParams {
                charm: String::from("cs:trusty/mysql-10"),
            }),
            vec![],
        )
    }

    #[test]
    fn test_plan_json_uses_change_records() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_plan(Some("abc"), &[charm_change()]);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["change_count"], 1);
        assert_eq!(value["changes"][0]["method"], "addCharm");
        assert_eq!(value["changes"][0]["args"]["charm"], "cs:trusty/mysql-10");
    }

    #[test]
    fn test_plan_text_lists_changes() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_plan(Some("0123456789abcdef"), &[charm_change()]);

        assert!(output.contains("01234567"));
        assert!(output.contains("addCharm-0"));
        assert!(output.contains("upload charm cs:trusty/mysql-10"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("a very long description", 10), "a very ...");
    }
}
