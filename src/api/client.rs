//! Control-plane client trait.
//!
//! Every side effect of a deployment goes through this trait. Each method is
//! one remote call, and the engine awaits each call before issuing the next.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::charm::CharmUrl;
use crate::error::ControlPlaneResult;

use super::types::{
    AddMachineArgs, AddUnitArgs, EntityType, MachineInfo, ServiceDeployArgs, UnitInfo,
};

/// Operations the deployment engine needs from the control plane.
///
/// Implementations report "already exists" conditions with the dedicated
/// [`ServiceAlreadyExists`](crate::error::ControlPlaneError::ServiceAlreadyExists)
/// and [`RelationAlreadyExists`](crate::error::ControlPlaneError::RelationAlreadyExists)
/// variants, which the engine treats as recoverable.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Resolves a charm URL against its store and adds the charm to the
    /// environment, returning the fully resolved URL.
    async fn add_charm(&self, url: &CharmUrl) -> ControlPlaneResult<CharmUrl>;

    /// Deploys a service.
    async fn deploy_service(&self, args: &ServiceDeployArgs) -> ControlPlaneResult<()>;

    /// Returns the charm URL a deployed service currently uses.
    async fn service_charm_url(&self, service: &str) -> ControlPlaneResult<CharmUrl>;

    /// Switches a service to another charm.
    async fn set_service_charm(
        &self,
        service: &str,
        url: &CharmUrl,
        force_units: bool,
    ) -> ControlPlaneResult<()>;

    /// Sets service options from a `{service: {option: value}}` YAML document.
    async fn set_service_config(&self, service: &str, config_yaml: &str) -> ControlPlaneResult<()>;

    /// Relates two endpoints.
    async fn add_relation(&self, endpoint1: &str, endpoint2: &str) -> ControlPlaneResult<()>;

    /// Provisions a machine or container and returns its id.
    async fn add_machine(&self, args: &AddMachineArgs) -> ControlPlaneResult<String>;

    /// Lists machines in the environment.
    async fn list_machines(&self) -> ControlPlaneResult<Vec<MachineInfo>>;

    /// Adds a unit to a service and returns the unit name.
    async fn add_unit(&self, args: &AddUnitArgs) -> ControlPlaneResult<String>;

    /// Lists the units of a service.
    async fn service_units(&self, service: &str) -> ControlPlaneResult<Vec<UnitInfo>>;

    /// Sets annotations on a service or machine.
    async fn set_annotations(
        &self,
        entity: EntityType,
        id: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ControlPlaneResult<()>;
}
