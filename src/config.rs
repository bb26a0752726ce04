//! Configuration management for schema-lens
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-lens.toml)
//! - Environment variables (SCHEMA_LENS__*)
//!
//! ## Example config file (schema-lens.toml):
//! ```toml
//! [http]
//! timeout_secs = 10
//!
//! [refresh]
//! concurrency = 8
//!
//! [[clusters]]
//! name = "prod"
//! url = "http://localhost:8081"
//! color = "#141414"
//! readonly_mode = true
//!
//! [[clusters]]
//! name = "dev"
//! url = "http://localhost:8383"
//! color = "red"
//! allow_global_config_changes = true
//! allow_schema_deletion = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SchemaError};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LensConfig {
    /// Registry targets, selected by name
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Bulk refresh settings
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// A named schema registry target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Display name (e.g. "prod")
    pub name: String,

    /// Base URL of the registry REST API
    pub url: String,

    /// Display color for UIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Forbid every mutating operation
    #[serde(default)]
    pub readonly_mode: bool,

    /// Allow changing the global compatibility level
    #[serde(default)]
    pub allow_global_config_changes: bool,

    /// Allow deleting schema versions (registry >= 3.3.0)
    #[serde(default)]
    pub allow_schema_deletion: bool,

    /// Allow the *_TRANSITIVE compatibility levels (registry >= 3.1.1)
    #[serde(default)]
    pub allow_transitive_compatibilities: bool,
}

/// Operations that cluster flags can forbid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    SetGlobalConfig,
    SetSubjectConfig,
    DeleteSchema,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Register => "register",
            Operation::SetGlobalConfig => "set-global-config",
            Operation::SetSubjectConfig => "set-subject-config",
            Operation::DeleteSchema => "delete-schema",
        };
        f.write_str(name)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Bulk refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Subjects fetched in parallel during a full refresh
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl ClusterConfig {
    /// A writable cluster with every optional feature disabled
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            color: None,
            readonly_mode: false,
            allow_global_config_changes: false,
            allow_schema_deletion: false,
            allow_transitive_compatibilities: false,
        }
    }

    /// The fallback target when nothing is configured
    pub fn local() -> Self {
        Self::new("local", "http://localhost:8081")
    }

    /// Whether this cluster's flags allow `operation`
    pub fn permits(&self, operation: Operation) -> bool {
        if self.readonly_mode {
            return false;
        }
        match operation {
            Operation::Register | Operation::SetSubjectConfig => true,
            Operation::SetGlobalConfig => self.allow_global_config_changes,
            Operation::DeleteSchema => self.allow_schema_deletion,
        }
    }

    /// Fail with `NotPermitted` unless `operation` is allowed
    pub fn ensure_permitted(&self, operation: Operation) -> Result<()> {
        if self.permits(operation) {
            Ok(())
        } else {
            Err(SchemaError::NotPermitted {
                operation,
                cluster: self.name.clone(),
            })
        }
    }
}

impl LensConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["schema-lens.toml", ".schema-lens.toml", "config/schema-lens.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-lens") {
            let xdg_config = config_dir.config_dir().join("schema-lens.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMA_LENS__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_LENS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Select a cluster by name, or the first configured one.
    /// With no clusters configured, `local` is used.
    pub fn cluster(&self, name: Option<&str>) -> Result<ClusterConfig> {
        match name {
            Some(name) => self
                .clusters
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or_else(|| SchemaError::UnknownCluster(name.to_string())),
            None => Ok(self.clusters.first().cloned().unwrap_or_else(ClusterConfig::local)),
        }
    }
}
