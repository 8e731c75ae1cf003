//! Parameter bags, SQL fragments and finished statements

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DynamicSqlError, Result};
use crate::field::DynamicField;

/// Named bind parameters for one statement
///
/// Insertion order is preserved. Inserting an existing name replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Bind `value` under `name`, returning the value it replaced
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge another bag into this one
    ///
    /// A name bound in both bags must carry the same value in each; otherwise
    /// one of the placeholders would bind the other's value.
    pub fn merge(&mut self, other: Parameters) -> Result<()> {
        for (name, value) in other.0 {
            match self.0.get(&name) {
                Some(existing) if *existing != value => {
                    return Err(DynamicSqlError::build(format!(
                        "parameter '{}' is bound to both {} and {}",
                        name, existing, value
                    )));
                }
                Some(_) => {}
                None => {
                    self.0.insert(name, value);
                }
            }
        }
        Ok(())
    }

    /// Bind every field under its own name, optionally prefixed
    pub fn from_fields(fields: &[DynamicField], prefix: &str) -> Self {
        fields
            .iter()
            .map(|f| (format!("{}{}", prefix, f.name), f.value.clone()))
            .collect()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Parameters {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// SQL text together with the parameters it references
///
/// Produced by [`ConditionBuilder::build`](crate::sql::condition::ConditionBuilder::build)
/// and accepted wherever a pre-built WHERE, ORDER or join expression is allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Parameters,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Parameters) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Fragment without any bound parameters
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Parameters::new())
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }
}

/// A complete statement ready for an executor
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Parameters,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Parameters) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}
