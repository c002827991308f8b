//! Constraint strings.
//!
//! Constraints are space-separated `key=value` pairs such as
//! `mem=4G cpu-cores=2 arch=amd64`. Sizes are stored in MiB and accept the
//! `M`, `G`, `T` and `P` suffixes (MiB when omitted). An empty value leaves
//! the constraint unset.

use std::fmt;

use crate::error::ConfigError;

/// Architectures the control plane knows about.
const KNOWN_ARCHES: &[&str] = &["amd64", "i386", "armhf", "arm64", "ppc64el", "s390x"];

/// Container types accepted by the `container` constraint.
const KNOWN_CONTAINERS: &[&str] = &["none", "lxc", "lxd", "kvm"];

/// Parsed machine constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    /// CPU architecture.
    pub arch: Option<String>,
    /// Container type the machine must be.
    pub container: Option<String>,
    /// Minimum number of effective cores.
    pub cpu_cores: Option<u64>,
    /// Minimum CPU power (100 = one reference core).
    pub cpu_power: Option<u64>,
    /// Minimum memory in MiB.
    pub mem: Option<u64>,
    /// Minimum root disk size in MiB.
    pub root_disk: Option<u64>,
    /// Required provider tags.
    pub tags: Option<Vec<String>>,
    /// Provider instance type.
    pub instance_type: Option<String>,
    /// Network spaces.
    pub spaces: Option<Vec<String>>,
    /// Virtualisation type.
    pub virt_type: Option<String>,
}

impl Constraints {
    /// Parses a constraints string.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, repeated keys, missing `=`, or
    /// values that do not fit the key.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidConstraints {
            value: value.to_string(),
            message,
        };

        let mut constraints = Self::default();
        let mut seen: Vec<&str> = Vec::new();

        for pair in value.split_whitespace() {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| invalid(format!("malformed constraint {pair:?}")))?;

            if seen.contains(&key) {
                return Err(invalid(format!("key {key:?} specified more than once")));
            }
            seen.push(key);

            if raw.is_empty() {
                continue;
            }

            match key {
                "arch" => {
                    if !KNOWN_ARCHES.contains(&raw) {
                        return Err(invalid(format!("unknown architecture {raw:?}")));
                    }
                    constraints.arch = Some(raw.to_string());
                }
                "container" => {
                    if !KNOWN_CONTAINERS.contains(&raw) {
                        return Err(invalid(format!("unknown container type {raw:?}")));
                    }
                    constraints.container = Some(raw.to_string());
                }
                "cpu-cores" => constraints.cpu_cores = Some(parse_count(key, raw).map_err(invalid)?),
                "cpu-power" => constraints.cpu_power = Some(parse_count(key, raw).map_err(invalid)?),
                "mem" => constraints.mem = Some(parse_size(key, raw).map_err(invalid)?),
                "root-disk" => constraints.root_disk = Some(parse_size(key, raw).map_err(invalid)?),
                "tags" => constraints.tags = Some(parse_list(raw)),
                "spaces" => constraints.spaces = Some(parse_list(raw)),
                "instance-type" => constraints.instance_type = Some(raw.to_string()),
                "virt-type" => constraints.virt_type = Some(raw.to_string()),
                other => return Err(invalid(format!("unknown constraint {other:?}"))),
            }
        }

        Ok(constraints)
    }

    /// Returns true if no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Checks constraint syntax, for use as the bundle verifier's constraint checker.
///
/// # Errors
///
/// Returns the parse error if the string is not valid.
pub fn check_constraints(value: &str) -> Result<(), ConfigError> {
    Constraints::parse(value).map(|_| ())
}

/// Returns true if two constraint strings describe the same constraints.
///
/// Strings that do not parse only match when byte-identical.
#[must_use]
pub fn constraints_match(a: &str, b: &str) -> bool {
    match (Constraints::parse(a), Constraints::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

fn parse_count(key: &str, raw: &str) -> Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("{key} must be a non-negative integer, got {raw:?}"))
}

fn parse_size(key: &str, raw: &str) -> Result<u64, String> {
    let (number, multiplier) = match raw.char_indices().last() {
        Some((i, 'M')) => (&raw[..i], 1.0),
        Some((i, 'G')) => (&raw[..i], 1024.0),
        Some((i, 'T')) => (&raw[..i], 1024.0 * 1024.0),
        Some((i, 'P')) => (&raw[..i], 1024.0 * 1024.0 * 1024.0),
        _ => (raw, 1.0),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| format!("{key} must be a size such as 512M or 4G, got {raw:?}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{key} must be a non-negative size, got {raw:?}"));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mib = (value * multiplier).ceil() as u64;
    Ok(mib)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(arch) = &self.arch {
            parts.push(format!("arch={arch}"));
        }
        if let Some(container) = &self.container {
            parts.push(format!("container={container}"));
        }
        if let Some(cores) = self.cpu_cores {
            parts.push(format!("cpu-cores={cores}"));
        }
        if let Some(power) = self.cpu_power {
            parts.push(format!("cpu-power={power}"));
        }
        if let Some(mem) = self.mem {
            parts.push(format!("mem={mem}M"));
        }
        if let Some(disk) = self.root_disk {
            parts.push(format!("root-disk={disk}M"));
        }
        if let Some(tags) = &self.tags {
            parts.push(format!("tags={}", tags.join(",")));
        }
        if let Some(instance_type) = &self.instance_type {
            parts.push(format!("instance-type={instance_type}"));
        }
        if let Some(spaces) = &self.spaces {
            parts.push(format!("spaces={}", spaces.join(",")));
        }
        if let Some(virt) = &self.virt_type {
            parts.push(format!("virt-type={virt}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraints() {
        let c = Constraints::parse("mem=4G cpu-cores=2 arch=amd64 tags=a,b").unwrap();
        assert_eq!(c.mem, Some(4096));
        assert_eq!(c.cpu_cores, Some(2));
        assert_eq!(c.arch.as_deref(), Some("amd64"));
        assert_eq!(c.tags, Some(vec![String::from("a"), String::from("b")]));
        assert_eq!(c.to_string(), "arch=amd64 cpu-cores=2 mem=4096M tags=a,b");
    }

    #[test]
    fn test_empty_constraints() {
        assert!(Constraints::parse("").unwrap().is_empty());
        assert!(Constraints::parse("mem=").unwrap().is_empty());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Constraints::parse("mem=512").unwrap().mem, Some(512));
        assert_eq!(Constraints::parse("root-disk=1.5G").unwrap().root_disk, Some(1536));
        assert_eq!(Constraints::parse("mem=1T").unwrap().mem, Some(1024 * 1024));
    }

    #[test]
    fn test_invalid_constraints() {
        assert!(Constraints::parse("bad-wolf").is_err());
        assert!(Constraints::parse("mem=lots").is_err());
        assert!(Constraints::parse("cpu-cores=-1").is_err());
        assert!(Constraints::parse("arch=sparc").is_err());
        assert!(Constraints::parse("mem=1G mem=2G").is_err());
        assert!(Constraints::parse("colour=red").is_err());
    }

    #[test]
    fn test_constraints_match_normalises() {
        assert!(constraints_match("mem=1G cpu-cores=1", "cpu-cores=1 mem=1024M"));
        assert!(!constraints_match("mem=1G", "mem=2G"));
        assert!(constraints_match("", ""));
    }
}
