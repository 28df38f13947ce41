//! Layered configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`.forte-config.toml`, or an explicit path)
//! 2. Environment variables (with `FORTE_` prefix)
//!
//! Environment variables override TOML configuration; anything unset falls
//! back to defaults.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [store]
//! backend = "firestore"
//! collection = "todos"
//! request_timeout_ms = 5000
//!
//! [firestore]
//! project_id = "procrastination-terminator"
//! api_key = "AIza..."
//!
//! [auth]
//! sign_in_route = "/login"
//!
//! [logging]
//! filter = "forte_tasks=debug,info"
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_SIGN_IN_ROUTE, TODOS_COLLECTION};
use crate::store::memory::InMemoryDocumentStore;
use crate::store::repository::TaskRepository;
use crate::store::{RepositoryConfig, TaskStore};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".forte-config.toml";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForteConfig {
    /// Task store settings.
    pub store: StoreSection,

    /// Firestore backend settings.
    pub firestore: FirestoreSection,

    /// Auth and redirect settings.
    pub auth: AuthSection,

    /// Log filter settings.
    pub logging: LoggingSection,
}

/// Which document store backs the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local [`InMemoryDocumentStore`].
    #[default]
    Memory,
    /// Cloud Firestore over REST (requires the `firestore` feature).
    Firestore,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "firestore" => Ok(Self::Firestore),
            other => Err(ConfigError::Invalid(format!(
                "unknown store backend '{other}'"
            ))),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Backend selection: "memory" or "firestore".
    pub backend: StoreBackend,

    /// Collection holding task documents.
    pub collection: String,

    /// Per-call deadline in milliseconds. Unset waits forever.
    pub request_timeout_ms: Option<u64>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            collection: TODOS_COLLECTION.to_string(),
            request_timeout_ms: None,
        }
    }
}

/// `[firestore]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirestoreSection {
    /// Google Cloud project ID. Required for the firestore backend.
    pub project_id: Option<String>,

    /// Database name.
    pub database: String,

    /// Web API key.
    pub api_key: Option<String>,

    /// REST root (point at the emulator for local runs).
    pub base_url: String,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FirestoreSection {
    fn default() -> Self {
        Self {
            project_id: None,
            database: "(default)".to_string(),
            api_key: None,
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Route anonymous sessions are redirected to.
    pub sign_in_route: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            sign_in_route: DEFAULT_SIGN_IN_ROUTE.to_string(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ForteConfig {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. `.forte-config.toml` in the working directory, if present
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the file exists but is not valid
    /// TOML, and propagates environment override errors.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or mistyped values.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `FORTE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for a number that does not parse and
    /// [`ConfigError::Invalid`] for an unknown backend name.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Store
        if let Some(backend) = lookup("FORTE_STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }
        if let Some(collection) = lookup("FORTE_STORE_COLLECTION") {
            self.store.collection = collection;
        }
        if let Some(ms) = lookup("FORTE_STORE_REQUEST_TIMEOUT_MS") {
            self.store.request_timeout_ms = Some(parse_env("FORTE_STORE_REQUEST_TIMEOUT_MS", &ms)?);
        }

        // Firestore
        if let Some(project_id) = lookup("FORTE_FIRESTORE_PROJECT_ID") {
            self.firestore.project_id = Some(project_id);
        }
        if let Some(database) = lookup("FORTE_FIRESTORE_DATABASE") {
            self.firestore.database = database;
        }
        if let Some(api_key) = lookup("FORTE_FIRESTORE_API_KEY") {
            self.firestore.api_key = Some(api_key);
        }
        if let Some(base_url) = lookup("FORTE_FIRESTORE_BASE_URL") {
            self.firestore.base_url = base_url;
        }
        if let Some(secs) = lookup("FORTE_FIRESTORE_TIMEOUT_SECS") {
            self.firestore.timeout_secs = parse_env("FORTE_FIRESTORE_TIMEOUT_SECS", &secs)?;
        }

        // Auth
        if let Some(route) = lookup("FORTE_AUTH_SIGN_IN_ROUTE") {
            self.auth.sign_in_route = route;
        }

        // Logging
        if let Some(filter) = lookup("FORTE_LOG") {
            self.logging.filter = filter;
        }

        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty collection name, an
    /// empty sign-in route, or a firestore backend without a project ID.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.collection must not be empty".to_string(),
            ));
        }
        if self.auth.sign_in_route.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.sign_in_route must not be empty".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Firestore
            && self
                .firestore
                .project_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "firestore backend requires firestore.project_id".to_string(),
            ));
        }
        Ok(())
    }

    /// Repository settings derived from `[store]`.
    pub fn repository_config(&self) -> RepositoryConfig {
        let config = RepositoryConfig::default().with_collection(self.store.collection.clone());
        match self.store.request_timeout_ms {
            Some(ms) => config.with_request_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }

    /// Firestore connection settings derived from `[firestore]`.
    ///
    /// Returns [`ConfigError::Invalid`] when `project_id` is missing.
    #[cfg(feature = "firestore")]
    pub fn firestore_config(&self) -> Result<crate::store::firestore::FirestoreConfig, ConfigError> {
        let project_id = self.firestore.project_id.clone().ok_or_else(|| {
            ConfigError::Invalid("firestore backend requires firestore.project_id".to_string())
        })?;
        let mut config = crate::store::firestore::FirestoreConfig::new(project_id)
            .with_database(self.firestore.database.clone())
            .with_base_url(self.firestore.base_url.clone())
            .with_timeout(Duration::from_secs(self.firestore.timeout_secs));
        if let Some(ref key) = self.firestore.api_key {
            config = config.with_api_key(key.clone());
        }
        Ok(config)
    }

    /// Validates and builds the configured task store.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Invalid`] if validation fails, or the firestore
    ///   backend is selected without the `firestore` feature.
    pub fn open_store(&self) -> Result<Arc<dyn TaskStore>, ConfigError> {
        self.validate()?;
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(
                TaskRepository::new(InMemoryDocumentStore::new())
                    .with_config(self.repository_config()),
            )),
            #[cfg(feature = "firestore")]
            StoreBackend::Firestore => {
                let backend =
                    crate::store::firestore::FirestoreDocumentStore::new(self.firestore_config()?)
                        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Arc::new(
                    TaskRepository::new(backend).with_config(self.repository_config()),
                ))
            },
            #[cfg(not(feature = "firestore"))]
            StoreBackend::Firestore => Err(ConfigError::Invalid(
                "firestore backend requires the `firestore` feature".to_string(),
            )),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Parse(format!("{key}={value}: {e}")))
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Parse error in configuration.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ForteConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.collection, "todos");
        assert_eq!(config.store.request_timeout_ms, None);
        assert_eq!(config.firestore.database, "(default)");
        assert_eq!(config.auth.sign_in_route, "/login");
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            [store]
            backend = "firestore"
            request_timeout_ms = 2500

            [firestore]
            project_id = "procrastination-terminator"
            api_key = "key-123"

            [auth]
            sign_in_route = "/signin"
        "#;

        let config = ForteConfig::from_toml(toml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.collection, "todos");
        assert_eq!(config.store.request_timeout_ms, Some(2500));
        assert_eq!(
            config.firestore.project_id.as_deref(),
            Some("procrastination-terminator")
        );
        assert_eq!(config.firestore.timeout_secs, 10);
        assert_eq!(config.auth.sign_in_route, "/signin");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ForteConfig::from_toml("").unwrap(), ForteConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let result = ForteConfig::from_toml("[store]\nbackend = \"postgres\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ForteConfig::default();
        config
            .apply_env_overrides(env(&[
                ("FORTE_STORE_BACKEND", "Firestore"),
                ("FORTE_STORE_COLLECTION", "todos-dev"),
                ("FORTE_STORE_REQUEST_TIMEOUT_MS", "750"),
                ("FORTE_FIRESTORE_PROJECT_ID", "p1"),
                ("FORTE_FIRESTORE_TIMEOUT_SECS", "3"),
                ("FORTE_LOG", "debug"),
            ]))
            .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.collection, "todos-dev");
        assert_eq!(config.store.request_timeout_ms, Some(750));
        assert_eq!(config.firestore.project_id.as_deref(), Some("p1"));
        assert_eq!(config.firestore.timeout_secs, 3);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_env_override_bad_number() {
        let mut config = ForteConfig::default();
        let result =
            config.apply_env_overrides(env(&[("FORTE_STORE_REQUEST_TIMEOUT_MS", "soon")]));
        assert!(matches!(result, Err(ConfigError::Parse(ref m)) if m.contains("FORTE_STORE_REQUEST_TIMEOUT_MS")));
    }

    #[test]
    fn test_validate_rejects_firestore_without_project() {
        let mut config = ForteConfig::default();
        config.store.backend = StoreBackend::Firestore;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.firestore.project_id = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_collection() {
        let mut config = ForteConfig::default();
        config.store.collection = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_repository_config() {
        let mut config = ForteConfig::default();
        config.store.collection = "todos-test".to_string();
        config.store.request_timeout_ms = Some(100);
        let repo = config.repository_config();
        assert_eq!(repo.collection, "todos-test");
        assert_eq!(repo.request_timeout, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_open_memory_store() {
        assert!(ForteConfig::default().open_store().is_ok());
    }
}
