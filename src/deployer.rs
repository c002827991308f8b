//! Bundle deployer.
//!
//! This module drives a deployment end to end: it verifies the bundle, builds
//! the change list, applies it through the change executor and reports what
//! happened. Verification runs before the first control-plane call, so an
//! invalid bundle never leaves anything behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ControlPlaneClient, DeploymentLogger};
use crate::bundle::{BundleData, BundleHasher, check_constraints};
use crate::changes::{Change, ChangeExecutor, ChangeOutcome, ResultTable, build_changes};
use crate::error::Result;

/// A verified bundle turned into an ordered change list.
#[derive(Debug)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Content hash of the bundle the plan is based on.
    pub bundle_hash: String,
    /// Changes in application order.
    pub changes: Vec<Change>,
    /// Verification warnings.
    pub warnings: Vec<String>,
}

/// Report of a deployment run.
#[derive(Debug, Serialize)]
pub struct DeploymentReport {
    /// Content hash of the deployed bundle, if deployed from a bundle.
    pub bundle_hash: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-change outcomes, in application order.
    pub outcomes: Vec<ChangeOutcome>,
    /// Results recorded for every applied change.
    pub results: ResultTable,
}

/// Deploys bundles against a control plane.
pub struct BundleDeployer<'a> {
    /// Control-plane client.
    client: &'a dyn ControlPlaneClient,
    /// Progress logger.
    log: &'a dyn DeploymentLogger,
}

impl DeploymentPlan {
    /// Verifies a bundle and builds its change list.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the bundle does not verify.
    pub fn from_bundle(bundle: &BundleData) -> Result<Self> {
        let validation = bundle.verify(check_constraints)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let changes = build_changes(bundle);
        debug!("Built {} changes", changes.len());

        Ok(Self {
            created_at: Utc::now(),
            bundle_hash: BundleHasher::new().hash_bundle(bundle),
            changes,
            warnings: validation.warnings,
        })
    }

    /// Returns true if the plan has no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl DeploymentReport {
    /// Returns the number of changes that modified the environment.
    #[must_use]
    pub fn modified(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_change()).count()
    }

    /// Returns the number of changes satisfied by existing resources.
    #[must_use]
    pub fn reused(&self) -> usize {
        self.outcomes.len() - self.modified()
    }
}

impl<'a> BundleDeployer<'a> {
    /// Creates a new deployer.
    #[must_use]
    pub const fn new(client: &'a dyn ControlPlaneClient, log: &'a dyn DeploymentLogger) -> Self {
        Self { client, log }
    }

    /// Verifies, plans and deploys a bundle.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bundle does not verify, or the
    /// deploy error of the first change that failed.
    pub async fn deploy(&self, bundle: &BundleData) -> Result<DeploymentReport> {
        let plan = DeploymentPlan::from_bundle(bundle)?;
        self.apply(&plan).await
    }

    /// Applies a plan.
    ///
    /// # Errors
    ///
    /// Returns the deploy error of the first change that failed.
    pub async fn apply(&self, plan: &DeploymentPlan) -> Result<DeploymentReport> {
        info!(
            "Deploying bundle {} ({} changes)",
            BundleHasher::new().short_hash(&plan.bundle_hash),
            plan.changes.len()
        );
        self.apply_changes(Some(plan.bundle_hash.clone()), &plan.changes)
            .await
    }

    /// Applies a change list, for instance one loaded from a change file.
    ///
    /// # Errors
    ///
    /// Returns the deploy error of the first change that failed.
    pub async fn apply_changes(
        &self,
        bundle_hash: Option<String>,
        changes: &[Change],
    ) -> Result<DeploymentReport> {
        let started_at = Utc::now();

        let report = ChangeExecutor::new(self.client, self.log)
            .execute(changes)
            .await?;

        let finished_at = Utc::now();
        info!(
            "Deployment finished: {} changed, {} reused",
            report.modified(),
            report.reused()
        );

        Ok(DeploymentReport {
            bundle_hash,
            started_at,
            finished_at,
            outcomes: report.outcomes,
            results: report.results,
        })
    }
}

impl std::fmt::Debug for BundleDeployer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleDeployer").finish_non_exhaustive()
    }
}

impl std::fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Deployment complete:")?;
        writeln!(f, "  Changes applied: {}", self.outcomes.len())?;
        writeln!(f, "  Modified: {}", self.modified())?;
        writeln!(f, "  Reused: {}", self.reused())?;
        let elapsed = self.finished_at - self.started_at;
        write!(f, "  Duration: {}ms", elapsed.num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleParser;
    use crate::error::{BundleError, ConfigError};

    #[test]
    fn test_plan_from_bundle() {
        let bundle = BundleParser::new()
            .parse_yaml(
                "series: trusty\nservices:\n  mysql:\n    charm: mysql\n    num_units: 1\n",
                None,
            )
            .unwrap();

        let plan = DeploymentPlan::from_bundle(&bundle).unwrap();
        assert_eq!(plan.changes.len(), 3);
        assert_eq!(plan.bundle_hash.len(), 64);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_plan_rejects_invalid_bundle() {
        let bundle = BundleParser::new()
            .parse_yaml(
                "services:\n  mysql:\n    charm: cs:trusty/mysql\n    constraints: bad-wolf\n",
                None,
            )
            .unwrap();

        let err = DeploymentPlan::from_bundle(&bundle).unwrap_err();
        assert!(matches!(
            err,
            BundleError::Config(ConfigError::ValidationError { .. })
        ));
    }
}
