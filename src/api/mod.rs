//! Control-plane integration module.
//!
//! This module provides the client interface the deployment engine drives,
//! its HTTP implementation, and the progress logger.

mod client;
mod http;
mod logger;
mod types;

pub use client::ControlPlaneClient;
pub use http::{DEFAULT_TIMEOUT_SECS, HttpControlPlaneClient};
pub use logger::{DeploymentLogger, RecordingLogger, TracingLogger};
pub use types::{
    AddMachineArgs, AddUnitArgs, EntityType, MachineInfo, ServiceDeployArgs, UnitInfo,
};
