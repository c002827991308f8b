//! Execution outcomes.

use serde::Serialize;
use std::fmt;

use super::change::ChangeKind;
use super::placeholder::ResultTable;

/// What applying a change did to the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    /// A charm was added.
    Added,
    /// A service was deployed.
    Deployed,
    /// An existing resource was reused as-is.
    Reused,
    /// An existing service was moved to another revision of its charm.
    Upgraded {
        /// Charm URL before the upgrade.
        from: String,
        /// Charm URL after the upgrade.
        to: String,
    },
    /// A relation was added.
    Related,
    /// The relation already existed.
    AlreadyRelated,
    /// A machine or container was provisioned.
    Provisioned,
    /// A unit was added.
    UnitAdded,
    /// Annotations were set.
    Annotated,
}

/// Outcome of one applied change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    /// Change id.
    pub id: String,
    /// Change kind.
    pub kind: ChangeKind,
    /// What happened.
    pub outcome: Outcome,
    /// Result recorded for the change (may be empty).
    pub result: String,
}

/// Report of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    /// Per-change outcomes, in application order.
    pub outcomes: Vec<ChangeOutcome>,
    /// Results recorded for placeholder resolution.
    pub results: ResultTable,
}

impl Outcome {
    /// Returns true if the environment was modified.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Reused | Self::AlreadyRelated)
    }
}

impl ExecutionReport {
    /// Returns the number of applied changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no change was applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the number of changes that modified the environment.
    #[must_use]
    pub fn modified(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_change()).count()
    }

    /// Returns the number of changes satisfied by existing resources.
    #[must_use]
    pub fn reused(&self) -> usize {
        self.len() - self.modified()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Deployed => write!(f, "deployed"),
            Self::Reused => write!(f, "reused"),
            Self::Upgraded { from, to } => write!(f, "upgraded {from} -> {to}"),
            Self::Related => write!(f, "related"),
            Self::AlreadyRelated => write!(f, "already related"),
            Self::Provisioned => write!(f, "provisioned"),
            Self::UnitAdded => write!(f, "unit added"),
            Self::Annotated => write!(f, "annotated"),
        }
    }
}
