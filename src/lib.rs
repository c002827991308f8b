// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Bundle Deploy
//!
//! A declarative, idempotent deployment tool for charm bundles.
//!
//! ## Overview
//!
//! A bundle describes a desired application topology: services and the
//! charms they run, their configuration, the relations between them, the
//! machines they are placed on and annotations. Bundle Deploy converges a
//! live environment toward that description by issuing an ordered sequence
//! of operations against the control-plane API.
//!
//! ## Architecture
//!
//! 1. **Bundle**: loaded from `bundle.yaml` and verified before anything runs
//! 2. **Change graph**: an ordered list of changes (`addCharm`, `deploy`,
//!    `addMachines`, `addUnit`, `addRelation`, `setAnnotations`) where later
//!    changes refer to earlier results through `$<change-id>` placeholders
//! 3. **Engine**: applies changes one at a time, reusing or upgrading what
//!    already exists, and stops at the first fatal error without rolling back
//!
//! ## Modules
//!
//! - [`bundle`]: Bundle parsing, verification and hashing
//! - [`charm`]: Charm URLs
//! - [`changes`]: Change graph, placeholder resolution and execution engine
//! - [`api`]: Control-plane client and progress logging
//! - [`deployer`]: End-to-end deployment
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! series: trusty
//! services:
//!   wordpress:
//!     charm: cs:trusty/wordpress-3
//!     num_units: 1
//!   mysql:
//!     charm: cs:trusty/mysql-10
//!     num_units: 1
//! relations:
//!   - ["wordpress:db", "mysql:db"]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod bundle;
pub mod changes;
pub mod charm;
pub mod cli;
pub mod deployer;
pub mod error;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{ControlPlaneClient, DeploymentLogger, HttpControlPlaneClient, TracingLogger};
pub use bundle::{BundleData, BundleParser, BundleValidator};
pub use changes::{Change, ChangeExecutor, ChangeKind, ExecutionReport, ResultTable};
pub use charm::CharmUrl;
pub use cli::{Cli, Commands, OutputFormatter};
pub use deployer::{BundleDeployer, DeploymentPlan, DeploymentReport};
pub use error::{BundleError, Result};
