//! Charm URL handling.
//!
//! A charm URL has the form `schema:[~user/]series/name[-revision]`, for
//! instance `cs:trusty/mysql-10` or `local:precise/wordpress`. Two URLs that
//! only differ by revision point at the same charm, which is what the service
//! upgrade policy relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Series used by charm store entities that are bundles, not charms.
pub const BUNDLE_SERIES: &str = "bundle";

/// Where a charm comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// The public charm store.
    #[default]
    Cs,
    /// A local charm repository.
    Local,
}

/// A parsed charm URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CharmUrl {
    schema: Schema,
    user: Option<String>,
    series: String,
    name: String,
    revision: Option<u32>,
}

impl CharmUrl {
    /// Parses a fully qualified charm URL (the series is required).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        Self::parse_with_series(url, None)
    }

    /// Parses a charm URL, filling in `default_series` when the URL has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or has no series and no
    /// default is given.
    pub fn parse_with_series(url: &str, default_series: Option<&str>) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidCharmUrl {
            url: url.to_string(),
            message: message.to_string(),
        };

        let (schema, rest) = match url.split_once(':') {
            Some(("cs", rest)) => (Schema::Cs, rest),
            Some(("local", rest)) => (Schema::Local, rest),
            Some((other, _)) => return Err(invalid(&format!("unknown schema {other:?}"))),
            None => (Schema::Cs, url),
        };

        let mut parts: Vec<&str> = rest.split('/').collect();

        let user = match parts.first() {
            Some(first) if first.starts_with('~') => {
                let user = &first[1..];
                if !is_valid_user(user) {
                    return Err(invalid(&format!("invalid user name {user:?}")));
                }
                if schema == Schema::Local {
                    return Err(invalid("local charm URLs cannot have a user"));
                }
                parts.remove(0);
                Some(user.to_string())
            }
            _ => None,
        };

        let (series, name_rev) = match parts.as_slice() {
            [series, name_rev] => ((*series).to_string(), *name_rev),
            [name_rev] => match default_series {
                Some(series) => (series.to_string(), *name_rev),
                None => return Err(invalid("charm URL without series")),
            },
            _ => return Err(invalid("too many path segments")),
        };

        if !is_valid_series(&series) {
            return Err(invalid(&format!("invalid series {series:?}")));
        }

        let (name, revision) = split_revision(name_rev);
        if !is_valid_name(name) {
            return Err(invalid(&format!("invalid charm name {name:?}")));
        }

        Ok(Self {
            schema,
            user,
            series,
            name: name.to_string(),
            revision,
        })
    }

    /// Returns the schema.
    #[must_use]
    pub const fn schema(&self) -> Schema {
        self.schema
    }

    /// Returns the series.
    #[must_use]
    pub fn series(&self) -> &str {
        &self.series
    }

    /// Returns the charm name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the revision, if pinned.
    #[must_use]
    pub const fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// Returns a copy of this URL with the given revision.
    #[must_use]
    pub fn with_revision(&self, revision: Option<u32>) -> Self {
        Self {
            revision,
            ..self.clone()
        }
    }

    /// Returns `[~user/]series/name`: the URL without schema and revision.
    #[must_use]
    pub fn path(&self) -> String {
        self.user.as_ref().map_or_else(
            || format!("{}/{}", self.series, self.name),
            |user| format!("~{user}/{}/{}", self.series, self.name),
        )
    }

    /// Returns true if both URLs name the same charm, whatever the revisions.
    ///
    /// Only the path is compared, so a `local:` charm and a `cs:` charm
    /// with the same user, series and name are the same charm.
    #[must_use]
    pub fn same_charm(&self, other: &Self) -> bool {
        self.path() == other.path()
    }

    /// Returns true if this URL points at a bundle rather than a charm.
    #[must_use]
    pub fn is_bundle(&self) -> bool {
        self.series == BUNDLE_SERIES
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cs => write!(f, "cs"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl fmt::Display for CharmUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.schema, self.path())?;
        if let Some(revision) = self.revision {
            write!(f, "-{revision}")?;
        }
        Ok(())
    }
}

impl FromStr for CharmUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CharmUrl {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CharmUrl> for String {
    fn from(url: CharmUrl) -> Self {
        url.to_string()
    }
}

/// Splits `name-42` into `("name", Some(42))`.
fn split_revision(name_rev: &str) -> (&str, Option<u32>) {
    if let Some((name, rev)) = name_rev.rsplit_once('-')
        && !rev.is_empty()
        && rev.bytes().all(|b| b.is_ascii_digit())
        && let Ok(revision) = rev.parse()
    {
        return (name, Some(revision));
    }
    (name_rev, None)
}

/// Charm names are lowercase, hyphen-separated, and every segment after the
/// first must contain a letter (so the revision suffix is unambiguous).
fn is_valid_name(name: &str) -> bool {
    let mut segments = name.split('-');
    let Some(first) = segments.next() else {
        return false;
    };
    if !first.starts_with(|c: char| c.is_ascii_lowercase()) || !is_lower_alnum(first) {
        return false;
    }
    segments.all(|s| is_lower_alnum(s) && s.chars().any(|c| c.is_ascii_lowercase()))
}

fn is_valid_series(series: &str) -> bool {
    series.starts_with(|c: char| c.is_ascii_lowercase()) && is_lower_alnum(series)
}

fn is_valid_user(user: &str) -> bool {
    user.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn is_lower_alnum(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
