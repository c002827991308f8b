//! Bundle specification types.
//!
//! This module defines the structs that map to a `bundle.yaml` file. A bundle
//! fully describes the desired topology: which services to deploy from which
//! charms, on which machines, and how they relate.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The root structure of a bundle file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BundleData {
    /// Default series for charms and machines that do not specify one.
    #[serde(default)]
    pub series: Option<String>,
    /// Services keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
    /// Machines keyed by bundle machine id ("0", "1", ...).
    #[serde(default, deserialize_with = "deserialize_machines")]
    pub machines: BTreeMap<String, MachineSpec>,
    /// Relations, each a pair of `service[:relation]` endpoints.
    #[serde(default)]
    pub relations: Vec<Vec<String>>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A service declared in a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceSpec {
    /// Charm URL the service is deployed from.
    pub charm: String,
    /// Number of units to add.
    #[serde(default)]
    pub num_units: u32,
    /// Placement directives, one per unit.
    #[serde(default, deserialize_with = "deserialize_placements")]
    pub to: Vec<String>,
    /// Charm configuration options.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
    /// Annotations set on the service.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Service-level constraints string.
    #[serde(default)]
    pub constraints: String,
}

/// A machine declared in a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MachineSpec {
    /// Machine series (defaults to the bundle series).
    #[serde(default)]
    pub series: Option<String>,
    /// Machine constraints string.
    #[serde(default)]
    pub constraints: String,
    /// Annotations set on the machine.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Container technologies a unit can be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    /// LXC container.
    Lxc,
    /// LXD container.
    Lxd,
    /// KVM virtual machine.
    Kvm,
}

/// A parsed placement directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// On a machine declared in the bundle.
    Machine(String),
    /// On a fresh machine.
    NewMachine,
    /// In a container, on a declared machine or a fresh one (`None`).
    Container {
        /// Container technology.
        container_type: ContainerType,
        /// Bundle machine id hosting the container.
        machine: Option<String>,
    },
}

impl BundleData {
    /// Returns the service names, in bundle order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Returns the total number of units requested across all services.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.services.values().map(|s| s.num_units).sum()
    }

    /// Returns the series a machine should use.
    #[must_use]
    pub fn machine_series(&self, machine: &MachineSpec) -> String {
        machine
            .series
            .clone()
            .or_else(|| self.series.clone())
            .unwrap_or_default()
    }
}

impl ContainerType {
    /// Parses a container type name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lxc" => Some(Self::Lxc),
            "lxd" => Some(Self::Lxd),
            "kvm" => Some(Self::Kvm),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lxc => "lxc",
            Self::Lxd => "lxd",
            Self::Kvm => "kvm",
        };
        write!(f, "{s}")
    }
}

impl Placement {
    /// Parses a placement directive such as `1`, `new`, `lxc:2` or `kvm:new`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the directive is not supported.
    pub fn parse(s: &str) -> Result<Self, String> {
        if let Some((container, machine)) = s.split_once(':') {
            let container_type = ContainerType::parse(container)
                .ok_or_else(|| format!("invalid container type {container:?} in placement {s:?}"))?;
            let machine = match machine {
                "new" => None,
                id if is_machine_id(id) => Some(id.to_string()),
                other => {
                    return Err(format!("invalid machine {other:?} in placement {s:?}"));
                }
            };
            return Ok(Self::Container {
                container_type,
                machine,
            });
        }

        match s {
            "new" => Ok(Self::NewMachine),
            id if is_machine_id(id) => Ok(Self::Machine(id.to_string())),
            other => Err(format!("unsupported placement {other:?}")),
        }
    }

    /// Returns the bundle machine this placement refers to, if any.
    #[must_use]
    pub fn machine(&self) -> Option<&str> {
        match self {
            Self::Machine(id) => Some(id),
            Self::Container { machine, .. } => machine.as_deref(),
            Self::NewMachine => None,
        }
    }
}

/// Bundle machine ids are non-negative integers.
#[must_use]
pub fn is_machine_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// YAML scalars that may appear where a string is expected (`0:`, `to: 1`).
#[derive(Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
enum Scalar {
    Number(u64),
    Text(String),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

fn deserialize_machines<'de, D>(deserializer: D) -> Result<BTreeMap<String, MachineSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<Scalar, Option<MachineSpec>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(id, spec)| (String::from(id), spec.unwrap_or_default()))
        .collect())
}

fn deserialize_placements<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Scalar),
        Many(Vec<Scalar>),
    }

    let raw: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None => vec![],
        Some(OneOrMany::One(one)) => vec![String::from(one)],
        Some(OneOrMany::Many(many)) => many.into_iter().map(String::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_parse() {
        assert_eq!(Placement::parse("1"), Ok(Placement::Machine(String::from("1"))));
        assert_eq!(Placement::parse("new"), Ok(Placement::NewMachine));
        assert_eq!(
            Placement::parse("lxc:2"),
            Ok(Placement::Container {
                container_type: ContainerType::Lxc,
                machine: Some(String::from("2")),
            })
        );
        assert_eq!(
            Placement::parse("kvm:new"),
            Ok(Placement::Container {
                container_type: ContainerType::Kvm,
                machine: None,
            })
        );
    }

    #[test]
    fn test_placement_invalid() {
        assert!(Placement::parse("mysql/0").is_err());
        assert!(Placement::parse("docker:1").is_err());
        assert!(Placement::parse("lxc:x").is_err());
        assert!(Placement::parse("").is_err());
    }

    #[test]
    fn test_numeric_machine_keys_and_placements() {
        let yaml = r"
services:
  mysql:
    charm: cs:trusty/mysql-10
    num_units: 1
    to: 0
machines:
  0:
  1:
    constraints: mem=2G
";
        let bundle: BundleData = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bundle.machines.len(), 2);
        assert_eq!(bundle.machines["1"].constraints, "mem=2G");
        assert_eq!(bundle.services["mysql"].to, vec![String::from("0")]);
    }
}
