//! SQL Identifier and Parameter Name Sanitization
//!
//! Identifiers are always quoted. Parameter names are restricted to a plain
//! word pattern so that placeholders can be located again when a statement is
//! expanded for a positional driver.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DynamicSqlError, Result};

static PARAMETER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("parameter name pattern is valid")
});

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Arguments
/// * `identifier` - The identifier to quote
///
/// # Returns
/// The identifier wrapped in double quotes with escaped internal quotes
///
/// # Example
/// ```
/// use dynamic_sql::sql::quote_identifier;
///
/// let quoted = quote_identifier("my_table");
/// assert_eq!(quoted, "\"my_table\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Whether a character may appear inside a parameter name
pub fn is_parameter_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Validate a bind parameter name
///
/// Rules:
/// - Must start with an ASCII letter or underscore
/// - Can only contain ASCII letters, digits and underscores
///
/// # Example
/// ```
/// use dynamic_sql::sql::validate_parameter_name;
///
/// assert!(validate_parameter_name("w_user_id").is_ok());
/// assert!(validate_parameter_name("1st").is_err());
/// ```
pub fn validate_parameter_name(name: &str) -> Result<()> {
    if PARAMETER_NAME.is_match(name) {
        Ok(())
    } else {
        Err(DynamicSqlError::InvalidParameterName(format!(
            "'{}' must start with a letter or underscore and contain only letters, digits and underscores",
            name
        )))
    }
}
