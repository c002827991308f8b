//! Placeholder resolution.
//!
//! Change arguments refer to the result of an earlier change with a
//! `$<change-id>` token. Relation endpoints may carry a `:<relation>` suffix
//! (`$deploy-1:db`), which is kept verbatim after resolution.
//!
//! Tokens are validated when a change is constructed, so the engine never
//! sees a malformed one. Resolution itself is total: a token whose change has
//! not produced a result yet resolves to the empty string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigError, DeployError};

/// Marker that starts every placeholder token.
pub const PLACEHOLDER_PREFIX: char = '$';

/// A validated `$<change-id>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Placeholder {
    change_id: String,
}

/// A relation endpoint: a service placeholder with an optional relation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    service: Placeholder,
    relation: Option<String>,
}

/// Results of applied changes, keyed by change id.
///
/// Entries are written once, when a change succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    entries: BTreeMap<String, String>,
}

impl Placeholder {
    /// Creates a placeholder referring to the given change.
    #[must_use]
    pub fn for_change(change_id: impl Into<String>) -> Self {
        Self {
            change_id: change_id.into(),
        }
    }

    /// Parses a `$<change-id>` token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not start with `$`, names no
    /// change, or contains a `:`.
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPlaceholder {
            token: token.to_string(),
        };

        let id = token.strip_prefix(PLACEHOLDER_PREFIX).ok_or_else(invalid)?;
        if id.is_empty() || id.contains(':') || id.contains(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self::for_change(id))
    }

    /// Returns the id of the referenced change.
    #[must_use]
    pub fn change_id(&self) -> &str {
        &self.change_id
    }
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub const fn new(service: Placeholder, relation: Option<String>) -> Self {
        Self { service, relation }
    }

    /// Parses a `$<change-id>[:<relation>]` token.
    ///
    /// # Errors
    ///
    /// Returns an error if the service part is not a valid placeholder or the
    /// relation name is empty.
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        match token.split_once(':') {
            Some((service, relation)) => {
                if relation.is_empty() {
                    return Err(ConfigError::InvalidPlaceholder {
                        token: token.to_string(),
                    });
                }
                Ok(Self::new(
                    Placeholder::parse(service)?,
                    Some(relation.to_string()),
                ))
            }
            None => Ok(Self::new(Placeholder::parse(token)?, None)),
        }
    }

    /// Returns the service placeholder.
    #[must_use]
    pub const fn service(&self) -> &Placeholder {
        &self.service
    }

    /// Returns the relation name, if any.
    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }
}

impl ResultTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of a change.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the change already has a result.
    pub fn record(
        &mut self,
        change_id: impl Into<String>,
        result: impl Into<String>,
    ) -> Result<(), DeployError> {
        let change_id = change_id.into();
        if self.entries.contains_key(&change_id) {
            return Err(DeployError::invariant(format!(
                "change {change_id} already has a result"
            )));
        }
        self.entries.insert(change_id, result.into());
        Ok(())
    }

    /// Returns the result of a change, if it has one.
    #[must_use]
    pub fn get(&self, change_id: &str) -> Option<&str> {
        self.entries.get(change_id).map(String::as_str)
    }

    /// Resolves a placeholder. Unknown changes resolve to the empty string.
    #[must_use]
    pub fn resolve(&self, placeholder: &Placeholder) -> &str {
        self.get(placeholder.change_id()).unwrap_or_default()
    }

    /// Resolves an endpoint, re-appending its relation name.
    #[must_use]
    pub fn resolve_endpoint(&self, endpoint: &Endpoint) -> String {
        let service = self.resolve(endpoint.service());
        match endpoint.relation() {
            Some(relation) => format!("{service}:{relation}"),
            None => service.to_string(),
        }
    }

    /// Returns the number of recorded results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no result has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(change id, result)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Resolves a raw `$<change-id>` token against a result table.
///
/// # Errors
///
/// A token without the `$` prefix is a programming error in the caller and
/// is reported as an invariant violation.
pub fn resolve_token(token: &str, results: &ResultTable) -> Result<String, DeployError> {
    let placeholder = Placeholder::parse(token)
        .map_err(|_| DeployError::invariant(format!("{token:?} is not a placeholder")))?;
    Ok(results.resolve(&placeholder).to_string())
}

/// Resolves a raw `$<change-id>[:<relation>]` endpoint token.
///
/// # Errors
///
/// Returns an invariant violation if the token is malformed.
pub fn resolve_endpoint_token(token: &str, results: &ResultTable) -> Result<String, DeployError> {
    let endpoint = Endpoint::parse(token)
        .map_err(|_| DeployError::invariant(format!("{token:?} is not an endpoint placeholder")))?;
    Ok(results.resolve_endpoint(&endpoint))
}

impl TryFrom<String> for Placeholder {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Placeholder> for String {
    fn from(placeholder: Placeholder) -> Self {
        placeholder.to_string()
    }
}

impl TryFrom<String> for Endpoint {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PLACEHOLDER_PREFIX}{}", self.change_id)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}:{relation}", self.service),
            None => write!(f, "{}", self.service),
        }
    }
}
