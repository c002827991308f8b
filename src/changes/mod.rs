//! Change graphs and their execution.
//!
//! This module provides the change data model, the builder deriving a change
//! list from a bundle, placeholder resolution, the idempotency policy, and the
//! engine applying a change list against the control plane.

mod builder;
mod change;
mod executor;
mod handlers;
mod idempotency;
mod placeholder;
mod report;

pub use builder::{ChangeBuilder, build_changes};
pub use change::{
    AddCharmParams, AddMachineParams, AddRelationParams, AddServiceParams, AddUnitParams,
    Change, ChangeKind, ChangeParams, ChangeRecord, SetAnnotationsParams,
};
pub use executor::ChangeExecutor;
pub use idempotency::{
    ServiceDecision, decide_existing_service, reconcile_existing_service, reusable_machine,
    reusable_unit,
};
pub use placeholder::{
    Endpoint, PLACEHOLDER_PREFIX, Placeholder, ResultTable, resolve_endpoint_token, resolve_token,
};
pub use report::{ChangeOutcome, ExecutionReport, Outcome};
