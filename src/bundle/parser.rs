//! Bundle parser for loading bundle and change files.
//!
//! This module handles loading bundles from YAML files and environment
//! variables, with proper precedence and error handling. It also loads change
//! lists produced by an external change-graph builder.

use crate::changes::{Change, ChangeRecord};
use crate::error::{BundleError, ConfigError, Result};
use std::path::Path;
use tracing::{debug, info};

use super::spec::BundleData;

/// Environment variable holding the control-plane API URL.
pub const API_URL_VAR: &str = "BUNDLE_DEPLOY_API_URL";

/// Environment variable holding the control-plane API token.
pub const API_TOKEN_VAR: &str = "BUNDLE_DEPLOY_API_TOKEN";

/// Environment variable overriding the bundle default series.
pub const SERIES_VAR: &str = "BUNDLE_DEPLOY_SERIES";

/// Bundle parser for loading deployment input.
#[derive(Debug, Default)]
pub struct BundleParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl BundleParser {
    /// Creates a new bundle parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a bundle from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<BundleData> {
        let path = path.as_ref();
        info!("Loading bundle from: {}", path.display());

        let content = Self::read(path)?;
        self.parse_yaml(&content, Some(path))
    }

    /// Parses a bundle from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<BundleData> {
        debug!("Parsing bundle YAML");

        let bundle: BundleData = serde_yaml::from_str(content).map_err(|e| {
            BundleError::Config(ConfigError::ParseError {
                what: String::from("bundle"),
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!("Parsed bundle with {} services", bundle.services.len());
        Ok(bundle)
    }

    /// Loads a bundle with environment variable overrides.
    ///
    /// `BUNDLE_DEPLOY_SERIES` replaces the bundle default series.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<BundleData> {
        let mut bundle = self.load_file(path)?;

        if let Ok(series) = std::env::var(SERIES_VAR) {
            debug!("Overriding series from environment");
            bundle.series = Some(series);
        }

        Ok(bundle)
    }

    /// Loads a change list written by an external change-graph builder.
    ///
    /// The file holds a JSON or YAML list of `{id, method, args, requires}`
    /// records, already in dependency order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or if a record has
    /// malformed arguments. Unknown methods are accepted here and rejected by
    /// the engine when reached.
    pub fn load_changes(&self, path: impl AsRef<Path>) -> Result<Vec<Change>> {
        let path = path.as_ref();
        info!("Loading change list from: {}", path.display());

        let content = Self::read(path)?;
        let records: Vec<ChangeRecord> = serde_yaml::from_str(&content).map_err(|e| {
            BundleError::Config(ConfigError::ParseError {
                what: String::from("change list"),
                message: e.to_string(),
                location: Some(path.display().to_string()),
            })
        })?;

        let changes = records
            .into_iter()
            .map(Change::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Loaded {} changes", changes.len());
        Ok(changes)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                BundleError::Config(ConfigError::ParseError {
                    what: String::from(".env file"),
                    message: e.to_string(),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the control-plane API URL from environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not set.
    pub fn get_api_url() -> Result<String> {
        std::env::var(API_URL_VAR).map_err(|_| {
            BundleError::Config(ConfigError::MissingEnvVar {
                name: String::from(API_URL_VAR),
            })
        })
    }

    /// Gets the control-plane API token from environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn get_api_token() -> Result<String> {
        std::env::var(API_TOKEN_VAR).map_err(|_| {
            BundleError::Config(ConfigError::MissingEnvVar {
                name: String::from(API_TOKEN_VAR),
            })
        })
    }

    fn read(path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(BundleError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        std::fs::read_to_string(path).map_err(|e| {
            BundleError::Config(ConfigError::ParseError {
                what: path.display().to_string(),
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })
    }
}

/// Default bundle file names to search for.
pub const DEFAULT_BUNDLE_FILES: &[&str] = &["bundle.yaml", "bundle.yml"];

/// Finds the bundle file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no bundle file is found.
pub fn find_bundle_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_BUNDLE_FILES {
            let bundle_path = current.join(filename);
            if bundle_path.exists() {
                info!("Found bundle file: {}", bundle_path.display());
                return Ok(bundle_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(BundleError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_BUNDLE_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeParams;

    #[test]
    fn test_parse_minimal_bundle() {
        let yaml = r"
services:
  mysql:
    charm: cs:trusty/mysql-10
";
        let parser = BundleParser::new();
        let bundle = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(bundle.service_names(), vec!["mysql"]);
        assert_eq!(bundle.services["mysql"].num_units, 0);
        assert!(bundle.relations.is_empty());
    }

    #[test]
    fn test_parse_full_bundle() {
        let yaml = r#"
series: trusty
services:
  wordpress:
    charm: cs:trusty/wordpress-3
    num_units: 2
    to: [0, "lxc:1"]
    options:
      debug: true
      engine: nginx
    annotations:
      gui-x: "10"
  mysql:
    charm: cs:trusty/mysql-10
    num_units: 1
    constraints: mem=4G
machines:
  0:
    series: precise
  1:
    constraints: cpu-cores=2
relations:
  - ["wordpress:db", "mysql:server"]
"#;
        let parser = BundleParser::new();
        let bundle = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(bundle.series.as_deref(), Some("trusty"));
        assert_eq!(bundle.total_units(), 3);
        assert_eq!(bundle.services["wordpress"].to, vec!["0", "lxc:1"]);
        assert_eq!(
            bundle.services["wordpress"].options["debug"],
            serde_json::Value::Bool(true)
        );
        assert_eq!(bundle.machine_series(&bundle.machines["0"]), "precise");
        assert_eq!(bundle.machine_series(&bundle.machines["1"]), "trusty");
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let parser = BundleParser::new();
        let err = parser.parse_yaml("services: [", None).unwrap_err();
        assert!(matches!(err, BundleError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let parser = BundleParser::new();
        let err = parser.load_file("/definitely/not/here/bundle.yaml").unwrap_err();
        assert!(matches!(err, BundleError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_file_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join("bundle.yaml"),
            "services:\n  mysql:\n    charm: cs:trusty/mysql-10\n",
        )
        .unwrap();

        let found = find_bundle_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("bundle.yaml"));

        let bundle = BundleParser::new().load_file(&found).unwrap();
        assert_eq!(bundle.services.len(), 1);
    }

    #[test]
    fn test_load_changes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");
        std::fs::write(
            &path,
            r#"[
  {"id": "addCharm-0", "method": "addCharm", "args": {"charm": "cs:trusty/mysql-10"}, "requires": []},
  {"id": "deploy-1", "method": "deploy", "args": {"charm": "$addCharm-0", "service": "mysql"}, "requires": ["addCharm-0"]},
  {"id": "frobnicate-2", "method": "frobnicate", "args": {}, "requires": []}
]"#,
        )
        .unwrap();

        let changes = BundleParser::new().load_changes(&path).unwrap();
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0].params, ChangeParams::AddCharm(_)));
        assert!(matches!(changes[1].params, ChangeParams::AddService(_)));
        assert!(matches!(changes[2].params, ChangeParams::Unsupported { .. }));
    }

    #[test]
    fn test_load_changes_rejects_malformed_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.yaml");
        std::fs::write(
            &path,
            r"
- id: deploy-1
  method: deploy
  args: {charm: addCharm-0, service: mysql}
",
        )
        .unwrap();

        let err = BundleParser::new().load_changes(&path).unwrap_err();
        assert!(matches!(err, BundleError::Config(ConfigError::ParseError { .. })));
    }
}
