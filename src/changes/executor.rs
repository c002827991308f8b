//! Change execution engine.
//!
//! Applies a change list strictly in the order given. Each change is applied
//! only after the previous one has completed, and the first failure aborts
//! the run. Changes applied before the failure are not rolled back; running
//! the same list again relies on the idempotency policy to pick up where the
//! failed run stopped.

use tracing::{debug, error, info};

use crate::api::{ControlPlaneClient, DeploymentLogger};
use crate::error::DeployError;

use super::change::Change;
use super::handlers::RunContext;
use super::report::{ChangeOutcome, ExecutionReport};

/// Executor for change lists.
pub struct ChangeExecutor<'a> {
    /// Control-plane client.
    client: &'a dyn ControlPlaneClient,
    /// Progress logger.
    log: &'a dyn DeploymentLogger,
}

impl<'a> ChangeExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(client: &'a dyn ControlPlaneClient, log: &'a dyn DeploymentLogger) -> Self {
        Self { client, log }
    }

    /// Applies the changes in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised. Handler failures are wrapped in
    /// [`DeployError::ChangeFailed`] with the id and kind of the change. An
    /// unknown change kind aborts the run with
    /// [`DeployError::UnknownChangeKind`] before any call is made for it.
    pub async fn execute(&self, changes: &[Change]) -> Result<ExecutionReport, DeployError> {
        info!("Applying {} changes", changes.len());

        let mut ctx = RunContext::new(self.client, self.log);
        let mut outcomes = Vec::with_capacity(changes.len());

        for (index, change) in changes.iter().enumerate() {
            let Some(kind) = change.kind() else {
                error!("Change {} has unknown type {:?}", change.id, change.method());
                return Err(DeployError::UnknownChangeKind {
                    id: change.id.clone(),
                    method: change.method().to_string(),
                });
            };

            debug!("[{}/{}] {}", index + 1, changes.len(), change);

            let wrap = |source: DeployError| DeployError::ChangeFailed {
                id: change.id.clone(),
                kind,
                source: Box::new(source),
            };

            let applied = match ctx.apply(&change.id, &change.params).await {
                Ok(applied) => applied,
                Err(e) => {
                    error!("Change {} failed: {}", change.id, e);
                    return Err(wrap(e));
                }
            };

            ctx.results_mut()
                .record(change.id.as_str(), applied.result.as_str())
                .map_err(wrap)?;

            outcomes.push(ChangeOutcome {
                id: change.id.clone(),
                kind,
                outcome: applied.outcome,
                result: applied.result,
            });
        }

        info!("Applied {} changes", outcomes.len());

        Ok(ExecutionReport {
            outcomes,
            results: ctx.into_results(),
        })
    }
}

impl std::fmt::Debug for ChangeExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeExecutor").finish_non_exhaustive()
    }
}
