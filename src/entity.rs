//! Entity mapping: table names, aliases and logical delete descriptors

use serde_json::Value;

use crate::field::DynamicFields;

/// A possibly schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Flag column that marks rows as deleted instead of removing them
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDelete {
    pub field: String,
    pub deleted_value: Value,
    pub normal_value: Value,
}

impl LogicalDelete {
    pub fn new(field: impl Into<String>, deleted_value: Value, normal_value: Value) -> Self {
        Self {
            field: field.into(),
            deleted_value,
            normal_value,
        }
    }

    /// Boolean flag: `true` when deleted, `false` otherwise
    pub fn flag(field: impl Into<String>) -> Self {
        Self::new(field, Value::Bool(true), Value::Bool(false))
    }

    /// Name of the bind parameter that carries the flag value
    pub fn param_name(&self) -> String {
        format!("ld_{}", self.field)
    }
}

/// A type mapped to a database table
pub trait Entity: DynamicFields {
    const TABLE: &'static str;

    const SCHEMA: Option<&'static str> = None;

    fn table_name() -> TableName {
        let table = TableName::new(Self::TABLE);
        match Self::SCHEMA {
            Some(schema) => table.in_schema(schema),
            None => table,
        }
    }

    /// Qualifier used for this entity's columns inside conditions
    fn table_alias() -> &'static str {
        Self::TABLE
    }

    /// Present when deletes should flip a flag column instead of removing rows
    fn logical_delete() -> Option<LogicalDelete> {
        None
    }
}
