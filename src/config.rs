//! Configuration for Database
//!
//! Provides a builder pattern for configuring the connection and SQL dialect.

use std::time::Duration;

use crate::error::{DynamicSqlError, Result};
use crate::sql::dialect::DialectKind;

/// Configuration for a database connection
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL database URL
    pub database_url: String,
    /// SQL dialect statements are rendered in (default: standard)
    pub dialect: DialectKind,
    /// Per-statement timeout (default: none)
    pub timeout: Option<Duration>,
    /// Maximum pool size (default: 10)
    pub max_connections: u32,
    /// Whether executed statements are logged at DEBUG (default: true)
    pub log_statements: bool,
}

impl DatabaseConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(database_url)
    }
}

/// Builder for DatabaseConfig
#[derive(Debug)]
pub struct DatabaseConfigBuilder {
    database_url: String,
    dialect: DialectKind,
    timeout: Option<Duration>,
    max_connections: u32,
    log_statements: bool,
}

impl DatabaseConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            dialect: DialectKind::Standard,
            timeout: None,
            max_connections: 10,
            log_statements: true,
        }
    }

    /// Set the SQL dialect (default: standard)
    pub fn dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the SQL dialect by name, e.g. from a settings file
    pub fn dialect_name(self, name: &str) -> Result<Self> {
        let dialect = DialectKind::from_name(name)
            .ok_or_else(|| DynamicSqlError::validation(format!("unknown SQL dialect '{}'", name)))?;
        Ok(self.dialect(dialect))
    }

    /// Set the per-statement timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum pool size (default: 10, minimum: 1)
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Enable or disable statement logging (default: true)
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database_url,
            dialect: self.dialect,
            timeout: self.timeout,
            max_connections: self.max_connections,
            log_statements: self.log_statements,
        }
    }
}
