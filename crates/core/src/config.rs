//! Configuration types shared across crates.

use crate::size::{ReadLimit, SizeThreshold};
use serde::{Deserialize, Serialize};

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Database connection configuration.
///
/// Fields left unset fall back to the libpq environment variables
/// (`PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. Takes precedence over individual fields if both are provided.
    pub url: Option<String>,
    /// Database host (e.g., "localhost" or "db.example.com").
    pub host: Option<String>,
    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: Option<u16>,
    /// Database username.
    pub username: Option<String>,
    /// Database password.
    /// WARNING: Prefer PGSTASH_DATABASE__PASSWORD env var over storing in config.
    pub password: Option<String>,
    /// Database name.
    pub database: Option<String>,
    /// SSL mode for connections.
    pub ssl_mode: Option<PgSslMode>,
    /// Maximum connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Statement timeout in milliseconds.
    /// PostgreSQL cancels statements that exceed this duration.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: Option<u64>,
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(300000) // 5 minutes
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: default_max_connections(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Build a configuration from a connection URL with default pool settings.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Validate database configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("database max_connections must be at least 1".to_string());
        }
        if self.statement_timeout_ms == Some(0) {
            return Err(
                "database statement_timeout_ms must be positive (omit it to disable)".to_string(),
            );
        }
        Ok(())
    }
}

/// Destination table and size routing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Schema the destination table lives in.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Destination table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Files up to this many bytes are stored inline.
    #[serde(default)]
    pub size_threshold: SizeThreshold,
    /// Maximum bytes read into memory for inline storage.
    /// Must be at least `size_threshold`, otherwise every save fails.
    #[serde(default)]
    pub read_limit: ReadLimit,
    /// Create the destination table if it does not exist.
    #[serde(default = "default_create_table")]
    pub create_table: bool,
}

fn default_schema() -> String {
    crate::DEFAULT_SCHEMA.to_string()
}

fn default_table() -> String {
    crate::DEFAULT_TABLE_NAME.to_string()
}

fn default_create_table() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            table: default_table(),
            size_threshold: SizeThreshold::default(),
            read_limit: ReadLimit::default(),
            create_table: default_create_table(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    ///
    /// A read limit below the threshold is accepted here; the file saver
    /// reports it on every save.
    pub fn validate(&self) -> Result<(), String> {
        if self.table.is_empty() {
            return Err("storage table name cannot be empty".to_string());
        }
        if self.schema.is_empty() {
            return Err("storage schema cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Full application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn validate(&self) -> crate::Result<()> {
        self.database.validate().map_err(crate::Error::Config)?;
        self.storage.validate().map_err(crate::Error::Config)?;
        Ok(())
    }
}
