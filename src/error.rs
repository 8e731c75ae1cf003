//! Error types for SQL building and execution

use thiserror::Error;

/// Errors that can occur while building or executing statements
#[derive(Debug, Error)]
pub enum DynamicSqlError {
    /// A builder produced empty SQL text
    #[error("SQL exception: {0}")]
    Build(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter name: {0}")]
    InvalidParameterName(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Statement timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DynamicSqlError {
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DynamicSqlError>;
