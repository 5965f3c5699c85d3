//! # Configuration
//!
//! Application configuration loaded from TOML, every field defaulted:
//!
//! ```toml
//! environment = "production"
//!
//! [routing]
//! cache_path = "var/cache/routes.json"
//! match_policy = "strict"     # or "prefix"
//! order = "declaration"       # or "specificity"
//! controller_bases = ["BaseController"]
//!
//! [server]
//! address = "0.0.0.0:8080"
//! max_body_size = 1048576
//!
//! [logging]
//! format = "json"
//! filter = "trellis=debug"
//! ```
//!
//! `TRELLIS_ENV`, `TRELLIS_ROUTE_CACHE` and `TRELLIS_ADDRESS` override the
//! file through [`AppConfig::with_env_overrides`].

use crate::builder::RouteOrder;
use crate::error::{ConfigurationError, Result};
use crate::matcher::MatchPolicy;
use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Routes are rebuilt on every boot (default)
    #[default]
    Development,
    /// The route cache is read and written
    Production,
    /// Test runs
    Test,
}

impl Environment {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigurationError::Invalid {
                reason: format!("unknown environment `{other}`"),
            }),
        }
    }
}

/// Route compilation and matching settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Route cache file, used in production only
    pub cache_path: PathBuf,
    /// Treatment of request segments beyond the template
    pub match_policy: MatchPolicy,
    /// Final table order
    pub order: RouteOrder,
    /// Extra base types that make a declaration a controller
    pub controller_bases: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("var/cache/routes.json"),
            match_policy: MatchPolicy::Strict,
            order: RouteOrder::Declaration,
            controller_bases: Vec::new(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "trellis=info".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Routing settings
    pub routing: RoutingConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Read and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, `Error::Config` if it
    /// is not valid TOML for this shape, and `Error::Configuration` if the
    /// values are inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`], minus I/O.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TRELLIS_ENV`, `TRELLIS_ROUTE_CACHE` and `TRELLIS_ADDRESS`
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Invalid` for values that do not parse.
    pub fn with_env_overrides(self) -> std::result::Result<Self, ConfigurationError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed like the environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Invalid` for values that do not parse.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, ConfigurationError> {
        if let Some(environment) = lookup("TRELLIS_ENV") {
            self.environment = environment.parse()?;
        }
        if let Some(path) = lookup("TRELLIS_ROUTE_CACHE") {
            self.routing.cache_path = PathBuf::from(path);
        }
        if let Some(address) = lookup("TRELLIS_ADDRESS") {
            self.server.address = address.parse().map_err(|_| ConfigurationError::Invalid {
                reason: format!("`{address}` is not a socket address"),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check values that parse but cannot work
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Invalid` describing the first problem.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let invalid = |reason: &str| {
            Err(ConfigurationError::Invalid {
                reason: reason.to_string(),
            })
        };
        if self.server.max_body_size == 0 {
            return invalid("server.max_body_size must be positive");
        }
        if self.is_production() && self.routing.cache_path.as_os_str().is_empty() {
            return invalid("routing.cache_path is required in production");
        }
        if self.routing.controller_bases.iter().any(|b| b.trim().is_empty()) {
            return invalid("routing.controller_bases contains an empty name");
        }
        Ok(())
    }

    /// Whether the route cache is in use
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.routing.match_policy, MatchPolicy::Strict);
        assert_eq!(config.routing.order, RouteOrder::Declaration);
        assert_eq!(config.server.address.port(), 8000);
        assert!(!config.is_production());
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            environment = "production"

            [routing]
            cache_path = "/tmp/routes.json"
            match_policy = "prefix"
            order = "specificity"
            controller_bases = ["BaseController"]

            [server]
            address = "0.0.0.0:9090"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.routing.match_policy, MatchPolicy::Prefix);
        assert_eq!(config.routing.order, RouteOrder::Specificity);
        assert_eq!(config.server.address.port(), 9090);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "trellis=info");
    }

    #[test]
    fn test_invalid_toml() {
        let err = AppConfig::from_toml_str("environment = \"staging\"").unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert!(AppConfig::from_toml_str("[server]\nmax_body_size = 0").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRELLIS_ENV", "prod"),
            ("TRELLIS_ROUTE_CACHE", "/srv/cache/routes.json"),
            ("TRELLIS_ADDRESS", "127.0.0.1:3000"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::default()
            .with_overrides(|key| vars.get(key).map(ToString::to_string))
            .unwrap();
        assert!(config.is_production());
        assert_eq!(config.routing.cache_path, PathBuf::from("/srv/cache/routes.json"));
        assert_eq!(config.server.address.port(), 3000);
    }

    #[test]
    fn test_bad_override() {
        let err = AppConfig::default()
            .with_overrides(|key| (key == "TRELLIS_ADDRESS").then(|| "nowhere".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid { .. }));
    }
}
