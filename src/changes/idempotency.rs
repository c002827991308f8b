//! Idempotency policy.
//!
//! Decides what to do when a change meets a resource that already exists:
//! reuse it, upgrade it, or stop. Re-running a bundle against an environment
//! it was already applied to must not fail for that reason alone.
//!
//! - Services: the same charm URL is reused. Another revision of the same
//!   charm is upgraded in place. A different charm is fatal.
//! - Relations: an existing relation counts as success.
//! - Machines: an unclaimed, non-controller machine matching series,
//!   constraints, container type and parent is reused. A container
//!   requested without a parent may sit on any host.
//! - Units: an unclaimed unit of the service on the requested machine is
//!   reused.

use std::collections::HashSet;

use crate::api::{
    AddMachineArgs, ControlPlaneClient, DeploymentLogger, MachineInfo, UnitInfo,
};
use crate::charm::CharmUrl;
use crate::error::DeployError;

use super::report::Outcome;

/// What to do with a service that is already deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceDecision {
    /// The service already runs the requested charm.
    Reuse,
    /// The service runs another revision of the requested charm.
    Upgrade {
        /// Current charm.
        from: CharmUrl,
        /// Requested charm.
        to: CharmUrl,
    },
}

/// Decides how to treat an already deployed service.
///
/// # Errors
///
/// Returns [`DeployError::IncompatibleCharm`] if the service runs a different
/// charm than the requested one.
pub fn decide_existing_service(
    service: &str,
    existing: &CharmUrl,
    requested: &CharmUrl,
) -> Result<ServiceDecision, DeployError> {
    if existing == requested {
        return Ok(ServiceDecision::Reuse);
    }

    if !requested.same_charm(existing) {
        return Err(DeployError::IncompatibleCharm {
            service: service.to_string(),
            existing: existing.to_string(),
            requested: requested.to_string(),
        });
    }

    Ok(ServiceDecision::Upgrade {
        from: existing.clone(),
        to: requested.clone(),
    })
}

/// Brings an already deployed service onto the requested charm.
///
/// # Errors
///
/// Returns an error if the existing charm cannot be read, is incompatible,
/// or the upgrade call fails.
pub async fn reconcile_existing_service(
    client: &dyn ControlPlaneClient,
    log: &dyn DeploymentLogger,
    service: &str,
    requested: &str,
) -> Result<Outcome, DeployError> {
    let existing = client.service_charm_url(service).await.map_err(|e| {
        DeployError::operation(format!("cannot retrieve info for service {service:?}"), e)
    })?;

    let requested_url = CharmUrl::parse(requested).map_err(|e| DeployError::InvalidCharmUrl {
        url: requested.to_string(),
        message: e.to_string(),
    })?;

    match decide_existing_service(service, &existing, &requested_url)? {
        ServiceDecision::Reuse => {
            log.info(&format!("reusing service {service} (charm: {existing})"));
            Ok(Outcome::Reused)
        }
        ServiceDecision::Upgrade { from, to } => {
            client
                .set_service_charm(service, &to, false)
                .await
                .map_err(|e| {
                    DeployError::operation(
                        format!("cannot upgrade service {service:?} to charm {to}"),
                        e,
                    )
                })?;
            log.info(&format!("upgraded charm for existing service {service} (from {from} to {to})"));
            Ok(Outcome::Upgraded {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

/// Picks an existing machine that satisfies a provisioning request.
#[must_use]
pub fn reusable_machine<'m>(
    machines: &'m [MachineInfo],
    args: &AddMachineArgs,
    claimed: &HashSet<String>,
) -> Option<&'m MachineInfo> {
    machines
        .iter()
        .find(|m| !claimed.contains(&m.id) && m.satisfies(args))
}

/// Picks an existing unit that satisfies a unit request.
///
/// Without a target machine, any unclaimed unit of the service will do.
#[must_use]
pub fn reusable_unit<'u>(
    units: &'u [UnitInfo],
    machine: Option<&str>,
    claimed: &HashSet<String>,
) -> Option<&'u UnitInfo> {
    units.iter().find(|u| {
        !claimed.contains(&u.name)
            && machine.is_none_or(|target| u.machine.as_deref() == Some(target))
    })
}
