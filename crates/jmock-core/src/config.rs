//! Configuration for jmock
//!
//! Stored in .jmock/config.toml

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// jmock configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings
    pub storage: StorageConfig,

    /// HTTP server settings
    pub api: ApiConfig,
}

/// Which ticket store backs the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// SQLite database inside .jmock/
    #[default]
    Sqlite,
    /// Process-local, lost on exit
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(crate::Error::Config(format!("unknown storage backend: {}", s))),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Database file name, relative to .jmock/
    pub database: String,

    /// How long a storage call may wait on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database: "jmock.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# jmock configuration

[storage]
# Ticket store: "sqlite" (durable) or "memory" (lost on exit)
backend = "sqlite"

# Database file, relative to .jmock/
database = "jmock.db"

# How long a storage call may wait on a locked database (milliseconds)
busy_timeout_ms = 5000

[api]
# Address the HTTP server binds to
host = "0.0.0.0"

# Port (JMOCK_API_PORT overrides)
port = 5000
"#
        .to_string()
    }
}
