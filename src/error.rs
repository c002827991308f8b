//! Error types for the bundle deployment system.
//!
//! This module provides the error hierarchy for every stage of a deployment:
//! loading and verifying the bundle, talking to the control plane, and
//! applying the change graph.

use std::path::PathBuf;
use thiserror::Error;

use crate::changes::ChangeKind;

/// The main error type for the bundle deployment system.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Bundle loading and pre-flight validation errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Control-plane API errors raised outside of a change run.
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// Change-graph execution errors.
    #[error("Cannot deploy bundle: {0}")]
    Deploy(#[from] DeployError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Bundle loading and validation errors.
///
/// All of these are raised before the first change is applied, so they never
/// leave a partially deployed bundle behind.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bundle file was not found.
    #[error("Bundle file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The bundle or change file could not be parsed.
    #[error("Failed to parse {what}: {message}")]
    ParseError {
        /// What was being parsed (bundle, change list).
        what: String,
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Bundle verification failed.
    #[error("Bundle verification failed: {message}")]
    ValidationError {
        /// Description of the first verification error.
        message: String,
        /// Field that failed verification.
        field: Option<String>,
        /// Every verification error that was found.
        all: Vec<String>,
    },

    /// A constraints string is malformed.
    #[error("Invalid constraints {value:?}: {message}")]
    InvalidConstraints {
        /// The offending constraints string.
        value: String,
        /// What is wrong with it.
        message: String,
    },

    /// A charm URL is malformed.
    #[error("Invalid charm URL {url:?}: {message}")]
    InvalidCharmUrl {
        /// The offending URL.
        url: String,
        /// What is wrong with it.
        message: String,
    },

    /// A placeholder token does not start with `$`.
    #[error("Invalid placeholder {token:?}: placeholders must start with \"$\"")]
    InvalidPlaceholder {
        /// The offending token.
        token: String,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Errors reported by the control plane.
///
/// The "already exists" conditions are separate variants so handlers can
/// classify them structurally instead of inspecting error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlPlaneError {
    /// A service with this name is already deployed.
    #[error("service {service:?} already exists")]
    ServiceAlreadyExists {
        /// Name of the existing service.
        service: String,
    },

    /// The two endpoints are already related.
    #[error("relation between {endpoint1:?} and {endpoint2:?} already exists")]
    RelationAlreadyExists {
        /// First endpoint.
        endpoint1: String,
        /// Second endpoint.
        endpoint2: String,
    },

    /// The referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Description of the missing entity.
        entity: String,
    },

    /// Authentication or authorization failed.
    #[error("unauthorized access: {message}")]
    Unauthorized {
        /// Description of the failure.
        message: String,
    },

    /// API request failed.
    #[error("API request failed ({status}): {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error code reported by the API, if any.
        code: Option<String>,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The call did not complete in time.
    #[error("timed out calling {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },
}

/// Change-graph execution errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A change failed. Changes applied before it stay applied.
    #[error("change {id} ({kind}) failed: {source}")]
    ChangeFailed {
        /// Id of the failing change.
        id: String,
        /// Kind of the failing change.
        kind: ChangeKind,
        /// What went wrong.
        #[source]
        source: Box<DeployError>,
    },

    /// The change list contains a method the engine has no handler for.
    #[error("unknown change type {method:?} (change {id})")]
    UnknownChangeKind {
        /// Id of the offending change.
        id: String,
        /// The unrecognised method name.
        method: String,
    },

    /// The deployed service runs a charm that cannot be upgraded to the bundle one.
    #[error("bundle charm {requested:?} is incompatible with existing charm {existing:?} of service {service:?}")]
    IncompatibleCharm {
        /// Service name.
        service: String,
        /// Charm currently used by the service.
        existing: String,
        /// Charm the bundle asks for.
        requested: String,
    },

    /// A control-plane call failed.
    #[error("{operation}: {source}")]
    Operation {
        /// Human-readable description of the attempted operation.
        operation: String,
        /// The control-plane error.
        #[source]
        source: ControlPlaneError,
    },

    /// A placeholder resolved to an empty value where one is required.
    #[error("placeholder {placeholder} does not refer to a produced result")]
    UnresolvedPlaceholder {
        /// The placeholder token.
        placeholder: String,
    },

    /// A bundle URL was given where a charm URL is expected.
    #[error("expected charm URL, got bundle URL {url:?}")]
    UnexpectedBundleUrl {
        /// The bundle URL.
        url: String,
    },

    /// A charm URL could not be parsed during execution.
    #[error("cannot parse charm URL {url:?}: {message}")]
    InvalidCharmUrl {
        /// The offending URL.
        url: String,
        /// What is wrong with it.
        message: String,
    },

    /// Service options could not be encoded.
    #[error("cannot marshal options for service {service:?}: {message}")]
    OptionsEncoding {
        /// Service name.
        service: String,
        /// Encoder message.
        message: String,
    },

    /// An internal contract between the change builder and the engine was broken.
    #[error("internal invariant violated: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },
}

/// Result type alias for bundle deployment operations.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Result type alias for control-plane calls.
pub type ControlPlaneResult<T> = std::result::Result<T, ControlPlaneError>;

impl BundleError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the deploy error, if this is one.
    #[must_use]
    pub const fn as_deploy(&self) -> Option<&DeployError> {
        match self {
            Self::Deploy(e) => Some(e),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        let message = message.into();
        Self::ValidationError {
            all: vec![message.clone()],
            message,
            field: Some(field.into()),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            what: what.into(),
            message: message.into(),
            location: None,
        }
    }
}

impl ControlPlaneError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            code,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Returns true if the request was refused before the server acted on it,
    /// so sending it again cannot apply it twice.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl DeployError {
    /// Wraps a control-plane error with the operation that was attempted.
    #[must_use]
    pub fn operation(operation: impl Into<String>, source: ControlPlaneError) -> Self {
        Self::Operation {
            operation: operation.into(),
            source,
        }
    }

    /// Creates an invariant-violation error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Returns the id of the change that aborted the run, if known.
    #[must_use]
    pub fn change_id(&self) -> Option<&str> {
        match self {
            Self::ChangeFailed { id, .. } | Self::UnknownChangeKind { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Returns the innermost error, looking through `ChangeFailed` wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::ChangeFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_failed_carries_id_and_kind() {
        let err = DeployError::ChangeFailed {
            id: String::from("deploy-1"),
            kind: ChangeKind::AddService,
            source: Box::new(DeployError::operation(
                "cannot deploy service \"blog\"",
                ControlPlaneError::network("connection reset"),
            )),
        };

        assert_eq!(err.change_id(), Some("deploy-1"));
        let message = err.to_string();
        assert!(message.contains("deploy-1"));
        assert!(message.contains("deploy"));
        assert!(message.contains("connection reset"));
        assert!(matches!(err.root(), DeployError::Operation { .. }));
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(ControlPlaneError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(!ControlPlaneError::network("boom").is_retryable());
        assert!(
            !ControlPlaneError::ServiceAlreadyExists {
                service: String::from("blog")
            }
            .is_retryable()
        );
    }
}
