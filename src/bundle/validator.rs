//! Pre-flight verification of bundles.
//!
//! Verification runs before any change is applied, so a structurally invalid
//! bundle never causes a partial deployment. Every problem is collected; the
//! returned error carries the first one plus the full list.

use std::collections::HashSet;
use tracing::debug;

use crate::charm::CharmUrl;
use crate::error::{BundleError, ConfigError, Result};

use super::constraints::check_constraints;
use super::spec::{BundleData, MachineSpec, Placement, ServiceSpec, is_machine_id};

/// Validator for bundles.
#[derive(Debug, Default)]
pub struct BundleValidator;

/// Validation result containing all findings.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl BundleValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a bundle using the built-in constraint parser.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, bundle: &BundleData) -> Result<ValidationResult> {
        self.validate_with(bundle, check_constraints)
    }

    /// Validates a bundle, checking every constraints string with `checker`.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate_with<F>(&self, bundle: &BundleData, checker: F) -> Result<ValidationResult>
    where
        F: Fn(&str) -> std::result::Result<(), ConfigError>,
    {
        let mut result = ValidationResult::default();

        Self::validate_series(bundle, &mut result);
        Self::validate_services(bundle, &checker, &mut result);
        Self::validate_machines(bundle, &checker, &mut result);
        Self::validate_relations(bundle, &mut result);

        if result.errors.is_empty() {
            debug!("Bundle verification passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(BundleError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
                all: result.errors.iter().map(ToString::to_string).collect(),
            }))
        }
    }

    /// Validates the default series.
    fn validate_series(bundle: &BundleData, result: &mut ValidationResult) {
        if let Some(series) = &bundle.series
            && (series.is_empty() || series == crate::charm::BUNDLE_SERIES)
        {
            result.errors.push(ValidationError {
                field: String::from("series"),
                message: format!("Bundle declares invalid default series {series:?}"),
            });
        }
    }

    /// Validates all services.
    fn validate_services<F>(bundle: &BundleData, checker: &F, result: &mut ValidationResult)
    where
        F: Fn(&str) -> std::result::Result<(), ConfigError>,
    {
        if bundle.services.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("services"),
                message: String::from("Bundle does not define any services"),
            });
            return;
        }

        for (name, service) in &bundle.services {
            let prefix = format!("services.{name}");

            if !is_valid_service_name(name) {
                result.errors.push(ValidationError {
                    field: prefix.clone(),
                    message: format!(
                        "Service name '{name}' is invalid. Must be lowercase alphanumeric with hyphens."
                    ),
                });
            }

            Self::validate_charm(bundle, service, &prefix, result);

            if let Err(e) = checker(&service.constraints) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.constraints"),
                    message: e.to_string(),
                });
            }

            Self::validate_placements(bundle, service, &prefix, result);
        }
    }

    /// Validates the charm URL of a service.
    fn validate_charm(
        bundle: &BundleData,
        service: &ServiceSpec,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        if service.charm.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.charm"),
                message: String::from("Charm URL cannot be empty"),
            });
            return;
        }

        match CharmUrl::parse_with_series(&service.charm, bundle.series.as_deref()) {
            Ok(url) if url.is_bundle() => result.errors.push(ValidationError {
                field: format!("{prefix}.charm"),
                message: format!("Expected charm URL, got bundle URL {:?}", service.charm),
            }),
            Ok(url) if url.revision().is_none() => result.warnings.push(format!(
                "{prefix}.charm: {url} has no revision, the latest one will be used"
            )),
            Ok(_) => {}
            Err(e) => result.errors.push(ValidationError {
                field: format!("{prefix}.charm"),
                message: e.to_string(),
            }),
        }
    }

    /// Validates the placement directives of a service.
    fn validate_placements(
        bundle: &BundleData,
        service: &ServiceSpec,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        let count = service.to.len();
        if count > service.num_units as usize {
            result.errors.push(ValidationError {
                field: format!("{prefix}.to"),
                message: format!(
                    "Too many placement directives: {count} for {} units",
                    service.num_units
                ),
            });
        }

        for (i, directive) in service.to.iter().enumerate() {
            match Placement::parse(directive) {
                Ok(placement) => {
                    if let Some(machine) = placement.machine()
                        && !bundle.machines.contains_key(machine)
                    {
                        result.errors.push(ValidationError {
                            field: format!("{prefix}.to[{i}]"),
                            message: format!(
                                "Placement {directive:?} refers to undeclared machine {machine:?}"
                            ),
                        });
                    }
                }
                Err(message) => result.errors.push(ValidationError {
                    field: format!("{prefix}.to[{i}]"),
                    message,
                }),
            }
        }
    }

    /// Validates all machines.
    fn validate_machines<F>(bundle: &BundleData, checker: &F, result: &mut ValidationResult)
    where
        F: Fn(&str) -> std::result::Result<(), ConfigError>,
    {
        let used: HashSet<String> = bundle
            .services
            .values()
            .flat_map(|s| s.to.iter())
            .filter_map(|d| Placement::parse(d).ok())
            .filter_map(|p| p.machine().map(str::to_string))
            .collect();

        for (id, machine) in &bundle.machines {
            let prefix = format!("machines.{id}");

            if !is_machine_id(id) {
                result.errors.push(ValidationError {
                    field: prefix.clone(),
                    message: format!("Machine id {id:?} is not a non-negative integer"),
                });
            }

            Self::validate_machine(machine, checker, &prefix, result);

            if !used.contains(id) {
                result
                    .warnings
                    .push(format!("{prefix}: machine is not referenced by any placement"));
            }
        }
    }

    /// Validates a single machine.
    fn validate_machine<F>(
        machine: &MachineSpec,
        checker: &F,
        prefix: &str,
        result: &mut ValidationResult,
    ) where
        F: Fn(&str) -> std::result::Result<(), ConfigError>,
    {
        if let Err(e) = checker(&machine.constraints) {
            result.errors.push(ValidationError {
                field: format!("{prefix}.constraints"),
                message: e.to_string(),
            });
        }

        if let Some(series) = &machine.series
            && series.is_empty()
        {
            result.errors.push(ValidationError {
                field: format!("{prefix}.series"),
                message: String::from("Machine series cannot be empty"),
            });
        }
    }

    /// Validates relations.
    fn validate_relations(bundle: &BundleData, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, relation) in bundle.relations.iter().enumerate() {
            let field = format!("relations[{i}]");

            if relation.len() != 2 {
                result.errors.push(ValidationError {
                    field,
                    message: format!(
                        "Relation must have exactly two endpoints, got {}",
                        relation.len()
                    ),
                });
                continue;
            }

            for endpoint in relation {
                let service = endpoint.split_once(':').map_or(endpoint.as_str(), |(s, _)| s);
                if !bundle.services.contains_key(service) {
                    result.errors.push(ValidationError {
                        field: field.clone(),
                        message: format!(
                            "Relation endpoint {endpoint:?} refers to undeclared service {service:?}"
                        ),
                    });
                }
            }

            let mut key = relation.clone();
            key.sort();
            if !seen.insert(key) {
                result
                    .warnings
                    .push(format!("{field}: duplicate relation {}", relation.join(" <-> ")));
            }
        }
    }
}

impl BundleData {
    /// Verifies the bundle, checking constraints strings with `checker`.
    ///
    /// Must succeed before any change of this bundle is applied.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found.
    pub fn verify<F>(&self, checker: F) -> Result<ValidationResult>
    where
        F: Fn(&str) -> std::result::Result<(), ConfigError>,
    {
        BundleValidator::new().validate_with(self, checker)
    }
}

/// Service names are lowercase alphanumeric with hyphens, start with a letter,
/// and do not end with a hyphen.
fn is_valid_service_name(name: &str) -> bool {
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
