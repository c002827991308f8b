//! Bundle module.
//!
//! This module handles everything about the declarative bundle description:
//! - Parsing and deserializing `bundle.yaml`
//! - Pre-flight verification, including constraint-string syntax
//! - Computing bundle hashes for reporting

mod constraints;
mod hash;
mod parser;
mod spec;
mod validator;

pub use constraints::{Constraints, check_constraints, constraints_match};
pub use hash::BundleHasher;
pub use parser::{BundleParser, find_bundle_file};
pub use spec::{BundleData, ContainerType, MachineSpec, Placement, ServiceSpec, is_machine_id};
pub use validator::{BundleValidator, ValidationError, ValidationResult};
