//! Configuration loading and management
//!
//! A service is described in YAML:
//!
//! ```yaml
//! server:
//!   addr: 127.0.0.1:3000
//! error_mode: legacy        # or "status"
//! mongodb:
//!   uri: mongodb://localhost:27017
//!   database: shop
//! routes:
//!   - path: /items
//!     collection: items
//! ```

use crate::core::ErrorMode;
use crate::core::query::DEFAULT_RESERVED_KEYS;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (e.g., "127.0.0.1:3000")
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Connection settings for the MongoDB backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string (e.g., "mongodb://localhost:27017")
    pub uri: String,

    /// Database holding the routed collections
    pub database: String,
}

/// One mounted controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// URL path of the collection (e.g., "/items")
    pub path: String,

    /// Collection name in the database
    pub collection: String,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// How errors are reported over HTTP
    #[serde(default)]
    pub error_mode: ErrorMode,

    /// Query keys never used as filter clauses
    ///
    /// Defaults to `__fields`, `__populate`, `__sort`, `__limit`, `__skip`, `on`.
    /// The modifier keys stay reserved whatever is listed here.
    #[serde(default)]
    pub reserved_keys: Option<Vec<String>>,

    #[serde(default)]
    pub mongodb: Option<MongoConfig>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Paths answered by the server itself
pub const HEALTH_PATHS: [&str; 2] = ["/health", "/healthz"];

/// Reject paths that cannot be mounted as a collection
///
/// A path must start with `/`, must not be a health route once trailing
/// slashes are dropped, and must not contain route syntax (`{`, `}`, `*`).
pub fn check_route_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        bail!("Route path '{}' must start with '/'", path);
    }
    if path.contains(['{', '}', '*']) {
        bail!("Route path '{}' must not contain '{{', '}}' or '*'", path);
    }
    if HEALTH_PATHS.contains(&normalize_route_path(path)) {
        bail!("Route path '{}' is reserved for health checks", path);
    }
    Ok(())
}

/// `path` without trailing slashes, `/` for the root
pub fn normalize_route_path(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject route tables that cannot be mounted
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for route in &self.routes {
            check_route_path(&route.path)?;
            if route.path.len() > 1 && route.path.ends_with('/') {
                bail!("Route path '{}' must not end with '/'", route.path);
            }
            if route.collection.is_empty() {
                bail!("Route '{}' has an empty collection name", route.path);
            }
            if !seen.insert(route.path.as_str()) {
                bail!("Route path '{}' is declared twice", route.path);
            }
        }
        Ok(())
    }

    /// Effective reserved keys
    pub fn reserved_keys(&self) -> Vec<String> {
        match &self.reserved_keys {
            Some(keys) => keys.clone(),
            None => DEFAULT_RESERVED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            error_mode: ErrorMode::Legacy,
            reserved_keys: None,
            mongodb: Some(MongoConfig {
                uri: "mongodb://localhost:27017".to_string(),
                database: "common_route".to_string(),
            }),
            routes: vec![RouteConfig {
                path: "/items".to_string(),
                collection: "items".to_string(),
            }],
        }
    }
}
