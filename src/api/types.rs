//! Control-plane API types and data structures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bundle::{ContainerType, constraints_match};

/// Kind of entity that can carry annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A deployed service.
    Service,
    /// A machine or container.
    Machine,
}

/// Arguments for deploying a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeployArgs {
    /// Charm URL, as returned by `add_charm`.
    pub charm_url: String,
    /// Service name.
    pub service_name: String,
    /// Units to add along with the service.
    pub num_units: u32,
    /// Initial configuration as YAML.
    #[serde(default)]
    pub config_yaml: String,
    /// Service constraints.
    #[serde(default)]
    pub constraints: String,
    /// Machine to place the first unit on.
    #[serde(default)]
    pub to_machine_spec: String,
}

/// Arguments for provisioning a machine or container.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMachineArgs {
    /// Machine series.
    #[serde(default)]
    pub series: String,
    /// Machine constraints.
    #[serde(default)]
    pub constraints: String,
    /// Container type, when adding a container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<ContainerType>,
    /// Host machine of the container; `None` places it on a new machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Arguments for adding a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUnitArgs {
    /// Service name.
    pub service_name: String,
    /// Machine to place the unit on; `None` provisions a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_machine_spec: Option<String>,
}

/// A machine known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineInfo {
    /// Machine id (`0`, `1/lxc/0`, ...).
    pub id: String,
    /// Machine series.
    #[serde(default)]
    pub series: String,
    /// Constraints the machine was provisioned with.
    #[serde(default)]
    pub constraints: String,
    /// Container type, for containers.
    #[serde(default)]
    pub container_type: Option<ContainerType>,
    /// Host machine, for containers.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Whether the machine runs the control plane itself.
    #[serde(default)]
    pub controller: bool,
}

/// A unit known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitInfo {
    /// Unit name (`mysql/0`).
    pub name: String,
    /// Machine the unit is assigned to.
    #[serde(default)]
    pub machine: Option<String>,
}

impl EntityType {
    /// Returns the control-plane tag for an entity of this type.
    ///
    /// Machine ids of containers (`1/lxc/0`) use dashes in tags.
    #[must_use]
    pub fn tag(self, id: &str) -> String {
        match self {
            Self::Service => format!("service-{id}"),
            Self::Machine => format!("machine-{}", id.replace('/', "-")),
        }
    }
}

impl ServiceDeployArgs {
    /// Creates deploy arguments for a service with no units.
    #[must_use]
    pub fn new(service_name: impl Into<String>, charm_url: impl Into<String>) -> Self {
        Self {
            charm_url: charm_url.into(),
            service_name: service_name.into(),
            num_units: 0,
            config_yaml: String::new(),
            constraints: String::new(),
            to_machine_spec: String::new(),
        }
    }

    /// Sets the constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = constraints.into();
        self
    }
}

impl MachineInfo {
    /// Returns true if this machine satisfies a provisioning request.
    ///
    /// Controller machines never satisfy one. A container request without a
    /// parent accepts a container on any host.
    #[must_use]
    pub fn satisfies(&self, args: &AddMachineArgs) -> bool {
        !self.controller
            && (args.series.is_empty() || self.series == args.series)
            && constraints_match(&self.constraints, &args.constraints)
            && self.container_type == args.container_type
            && (args.container_type.is_none()
                || args
                    .parent_id
                    .as_ref()
                    .is_none_or(|parent| self.parent_id.as_ref() == Some(parent)))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Machine => write!(f, "machine"),
        }
    }
}
