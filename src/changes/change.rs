//! Change data model.
//!
//! A [`Change`] is one atomic step toward realizing a bundle. Changes are
//! immutable once built and are applied in the order they are supplied.
//! Parameters that refer to the result of an earlier change hold a
//! [`Placeholder`] instead of a concrete value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::api::EntityType;
use crate::bundle::ContainerType;
use crate::error::ConfigError;

use super::placeholder::{Endpoint, Placeholder};

/// The closed set of change kinds the engine knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Add a charm to the environment.
    #[serde(rename = "addCharm")]
    AddCharm,
    /// Provision a machine or container.
    #[serde(rename = "addMachines")]
    AddMachine,
    /// Deploy a service with no units.
    #[serde(rename = "deploy")]
    AddService,
    /// Add a unit to a service.
    #[serde(rename = "addUnit")]
    AddUnit,
    /// Relate two service endpoints.
    #[serde(rename = "addRelation")]
    AddRelation,
    /// Set annotations on a service or machine.
    #[serde(rename = "setAnnotations")]
    SetAnnotations,
}

/// A single change of a change graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Identifier, unique within a run (e.g. `deploy-1`).
    pub id: String,
    /// Ids of the changes this one depends on.
    pub requires: Vec<String>,
    /// Kind-specific parameters.
    pub params: ChangeParams,
}

/// Kind-specific change parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeParams {
    /// Parameters of an `addCharm` change.
    AddCharm(AddCharmParams),
    /// Parameters of an `addMachines` change.
    AddMachine(AddMachineParams),
    /// Parameters of a `deploy` change.
    AddService(AddServiceParams),
    /// Parameters of an `addUnit` change.
    AddUnit(AddUnitParams),
    /// Parameters of an `addRelation` change.
    AddRelation(AddRelationParams),
    /// Parameters of a `setAnnotations` change.
    SetAnnotations(SetAnnotationsParams),
    /// A change whose method is not in the closed set.
    Unsupported {
        /// The method name as supplied.
        method: String,
        /// The raw arguments.
        args: serde_json::Value,
    },
}

/// Parameters for adding a charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCharmParams {
    /// Charm URL to resolve and add.
    pub charm: String,
}

/// Parameters for provisioning a machine or container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddMachineParams {
    /// Machine series.
    #[serde(default)]
    pub series: String,
    /// Constraints string.
    #[serde(default)]
    pub constraints: String,
    /// Container type, when adding a container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<ContainerType>,
    /// Machine hosting the container, when it is created by an earlier change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Placeholder>,
}

/// Parameters for deploying a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddServiceParams {
    /// Placeholder for the `addCharm` change providing the charm.
    pub charm: Placeholder,
    /// Service name.
    pub service: String,
    /// Initial charm options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
    /// Service constraints string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub constraints: String,
}

/// Parameters for adding a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUnitParams {
    /// Placeholder for the `deploy` change of the service.
    pub service: Placeholder,
    /// Placeholder for the `addMachines` change providing the machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Placeholder>,
}

/// Parameters for relating two endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRelationParams {
    /// First endpoint.
    pub endpoint1: Endpoint,
    /// Second endpoint.
    pub endpoint2: Endpoint,
}

/// Parameters for setting annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAnnotationsParams {
    /// Placeholder for the change that produced the annotated entity.
    pub id: Placeholder,
    /// Kind of the annotated entity.
    pub entity_type: EntityType,
    /// Annotations to set.
    pub annotations: BTreeMap<String, String>,
}

/// Wire form of a change, as exchanged with external change-graph builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Change id.
    pub id: String,
    /// Method name (`addCharm`, `deploy`, ...).
    pub method: String,
    /// Method arguments.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Ids of required changes.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl ChangeKind {
    /// Every known kind.
    pub const ALL: [Self; 6] = [
        Self::AddCharm,
        Self::AddMachine,
        Self::AddService,
        Self::AddUnit,
        Self::AddRelation,
        Self::SetAnnotations,
    ];

    /// Returns the method name used in change ids and change records.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::AddCharm => "addCharm",
            Self::AddMachine => "addMachines",
            Self::AddService => "deploy",
            Self::AddUnit => "addUnit",
            Self::AddRelation => "addRelation",
            Self::SetAnnotations => "setAnnotations",
        }
    }

    /// Looks up a kind by method name.
    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.method() == method)
    }
}

impl Change {
    /// Creates a change.
    #[must_use]
    pub fn new(id: impl Into<String>, params: ChangeParams, requires: Vec<String>) -> Self {
        Self {
            id: id.into(),
            requires,
            params,
        }
    }

    /// Returns the kind, or `None` for unsupported methods.
    #[must_use]
    pub const fn kind(&self) -> Option<ChangeKind> {
        self.params.kind()
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        match &self.params {
            ChangeParams::Unsupported { method, .. } => method,
            params => params.kind().map_or("", ChangeKind::method),
        }
    }

    /// Returns a placeholder referring to this change's result.
    #[must_use]
    pub fn placeholder(&self) -> Placeholder {
        Placeholder::for_change(&self.id)
    }

    /// Returns a human-readable description of the change.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.params {
            ChangeParams::AddCharm(p) => format!("upload charm {}", p.charm),
            ChangeParams::AddMachine(p) => match (&p.container_type, &p.parent_id) {
                (Some(container), Some(parent)) => {
                    format!("add {container} container to machine {parent}")
                }
                (Some(container), None) => format!("add {container} container to new machine"),
                _ => {
                    if p.series.is_empty() {
                        String::from("add new machine")
                    } else {
                        format!("add new {} machine", p.series)
                    }
                }
            },
            ChangeParams::AddService(p) => format!("deploy service {} using {}", p.service, p.charm),
            ChangeParams::AddUnit(p) => p.to.as_ref().map_or_else(
                || format!("add unit of {} to new machine", p.service),
                |to| format!("add unit of {} to {to}", p.service),
            ),
            ChangeParams::AddRelation(p) => {
                format!("add relation {} - {}", p.endpoint1, p.endpoint2)
            }
            ChangeParams::SetAnnotations(p) => {
                format!("set annotations for {} {}", p.entity_type, p.id)
            }
            ChangeParams::Unsupported { method, .. } => format!("unsupported change {method}"),
        }
    }
}

impl ChangeParams {
    /// Returns the kind, or `None` for unsupported methods.
    #[must_use]
    pub const fn kind(&self) -> Option<ChangeKind> {
        match self {
            Self::AddCharm(_) => Some(ChangeKind::AddCharm),
            Self::AddMachine(_) => Some(ChangeKind::AddMachine),
            Self::AddService(_) => Some(ChangeKind::AddService),
            Self::AddUnit(_) => Some(ChangeKind::AddUnit),
            Self::AddRelation(_) => Some(ChangeKind::AddRelation),
            Self::SetAnnotations(_) => Some(ChangeKind::SetAnnotations),
            Self::Unsupported { .. } => None,
        }
    }

    fn args(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::AddCharm(p) => serde_json::to_value(p),
            Self::AddMachine(p) => serde_json::to_value(p),
            Self::AddService(p) => serde_json::to_value(p),
            Self::AddUnit(p) => serde_json::to_value(p),
            Self::AddRelation(p) => serde_json::to_value(p),
            Self::SetAnnotations(p) => serde_json::to_value(p),
            Self::Unsupported { args, .. } => Ok(args.clone()),
        }
    }
}

impl TryFrom<ChangeRecord> for Change {
    type Error = ConfigError;

    fn try_from(record: ChangeRecord) -> Result<Self, Self::Error> {
        fn args<T: serde::de::DeserializeOwned>(
            record: &ChangeRecord,
        ) -> Result<T, ConfigError> {
            serde_json::from_value(record.args.clone()).map_err(|e| ConfigError::ParseError {
                what: format!("arguments of change {}", record.id),
                message: e.to_string(),
                location: None,
            })
        }

        let params = match ChangeKind::from_method(&record.method) {
            Some(ChangeKind::AddCharm) => ChangeParams::AddCharm(args(&record)?),
            Some(ChangeKind::AddMachine) => ChangeParams::AddMachine(args(&record)?),
            Some(ChangeKind::AddService) => ChangeParams::AddService(args(&record)?),
            Some(ChangeKind::AddUnit) => ChangeParams::AddUnit(args(&record)?),
            Some(ChangeKind::AddRelation) => ChangeParams::AddRelation(args(&record)?),
            Some(ChangeKind::SetAnnotations) => ChangeParams::SetAnnotations(args(&record)?),
            None => ChangeParams::Unsupported {
                method: record.method.clone(),
                args: record.args.clone(),
            },
        };

        Ok(Self {
            id: record.id,
            requires: record.requires,
            params,
        })
    }
}

impl From<&Change> for ChangeRecord {
    fn from(change: &Change) -> Self {
        Self {
            id: change.id.clone(),
            method: change.method().to_string(),
            // Params only hold strings and string-keyed maps, which always encode.
            args: change.params.args().unwrap_or_default(),
            requires: change.requires.clone(),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.description())
    }
}
