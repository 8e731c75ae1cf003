//! Named to positional placeholder expansion
//!
//! Statements are built with named placeholders (`@name` or `:name`).
//! PostgreSQL wants `$1, $2, …`, so before execution the SQL text is rewritten
//! and the bag is flattened into an ordered value list.
//!
//! Array values expand into one placeholder per element so that
//! `"id" in (@ids)` becomes `"id" in ($1, $2, $3)`. An empty array renders as
//! `NULL`, which makes `in (NULL)` match nothing. Null values, including
//! null array elements, are inlined as `NULL`, so they carry no parameter type.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{DynamicSqlError, Result};
use crate::params::Parameters;
use crate::sql::sanitize::is_parameter_char;

/// SQL with positional placeholders and the values they bind, in order
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalSql {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrite `prefix`-introduced named placeholders into `$n`
///
/// Text inside single-quoted literals and double-quoted identifiers is copied
/// untouched, as are `::` casts. A placeholder repeated in the statement
/// reuses its positions.
pub fn expand(sql: &str, prefix: char, params: &Parameters) -> Result<PositionalSql> {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut values = Vec::new();
    let mut rendered: HashMap<&str, String> = HashMap::new();

    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            ':' if chars.peek().map(|(_, n)| *n) == Some(':') => {
                // cast, not a placeholder
                out.push_str("::");
                chars.next();
            }
            c if c == prefix => {
                let starts_name = matches!(
                    chars.peek(),
                    Some((_, n)) if n.is_ascii_alphabetic() || *n == '_'
                );
                if !starts_name {
                    out.push(c);
                    continue;
                }

                let start = i + c.len_utf8();
                let mut end = start;
                while let Some((j, n)) = chars.peek().copied() {
                    if !is_parameter_char(n) {
                        break;
                    }
                    end = j + n.len_utf8();
                    chars.next();
                }
                let name = &sql[start..end];

                if let Some(text) = rendered.get(name) {
                    out.push_str(text);
                    continue;
                }

                let value = params
                    .get(name)
                    .ok_or_else(|| DynamicSqlError::MissingParameter(name.to_string()))?;
                let text = positional(value, &mut values);
                out.push_str(&text);
                rendered.insert(name, text);
            }
            _ => out.push(c),
        }
    }

    Ok(PositionalSql { sql: out, values })
}

fn positional(value: &Value, values: &mut Vec<Value>) -> String {
    match value {
        Value::Array(items) if items.is_empty() => "NULL".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| bind_one(item, values))
            .collect::<Vec<_>>()
            .join(", "),
        _ => bind_one(value, values),
    }
}

/// `$n` for the value, or `NULL` inlined so no untyped null is ever bound
fn bind_one(value: &Value, values: &mut Vec<Value>) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    values.push(value.clone());
    format!("${}", values.len())
}
