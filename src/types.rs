//! Column model of entity tables
//!
//! Used by the schema diff to compare what an entity declares with what the
//! database reports.

use serde::{Deserialize, Serialize};

// ============================================================================
// Column Types
// ============================================================================

/// Column type with its PostgreSQL spelling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    /// Unbounded text (maps to TEXT)
    Text,

    /// Bounded text (maps to CHARACTER VARYING(n))
    Varchar {
        length: u32,
    },

    Boolean,

    SmallInt,

    Integer,

    BigInt,

    /// Exact decimal (maps to NUMERIC(p,s))
    Decimal {
        /// Total number of digits (default: 19)
        #[serde(default = "default_precision")]
        precision: u8,
        /// Number of digits after decimal point (default: 4)
        #[serde(default = "default_scale")]
        scale: u8,
    },

    Real,

    Double,

    /// Timestamp, always stored in UTC (maps to TIMESTAMP WITH TIME ZONE)
    Timestamp,

    /// Binary JSON (maps to JSONB)
    Json,
}

fn default_precision() -> u8 {
    19
}

fn default_scale() -> u8 {
    4
}

impl ColumnType {
    /// Create a Decimal type with specified precision and scale
    pub fn decimal(precision: u8, scale: u8) -> Self {
        ColumnType::Decimal { precision, scale }
    }

    pub fn varchar(length: u32) -> Self {
        ColumnType::Varchar { length }
    }

    /// PostgreSQL type name as `format_type` reports it
    pub fn to_sql_type(&self) -> String {
        match self {
            ColumnType::Text => "text".to_string(),
            ColumnType::Varchar { length } => format!("character varying({})", length),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Decimal { precision, scale } => format!("numeric({},{})", precision, scale),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Timestamp => "timestamp with time zone".to_string(),
            ColumnType::Json => "jsonb".to_string(),
        }
    }

    /// Whether a type name reported by the database denotes this type
    pub fn matches_db_type(&self, db_type: &str) -> bool {
        normalize_db_type(db_type) == self.to_sql_type()
    }
}

/// Canonical spelling of a PostgreSQL type name
///
/// Lowercases, collapses whitespace, drops spaces inside the modifier list and
/// resolves the common short aliases (`int4`, `varchar(n)`, `timestamptz`, …).
pub fn normalize_db_type(db_type: &str) -> String {
    let lowered = db_type.trim().to_ascii_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    let (base, modifier) = match collapsed.find('(') {
        Some(open) => {
            let modifier: String = collapsed[open..].chars().filter(|c| !c.is_whitespace()).collect();
            (collapsed[..open].trim_end().to_string(), modifier)
        }
        None => (collapsed, String::new()),
    };

    let base = match base.as_str() {
        "int" | "int4" => "integer",
        "int2" => "smallint",
        "int8" => "bigint",
        "bool" => "boolean",
        "varchar" => "character varying",
        "float4" => "real",
        "float8" => "double precision",
        "decimal" => "numeric",
        "timestamptz" => "timestamp with time zone",
        other => other,
    };

    format!("{}{}", base, modifier)
}

// ============================================================================
// Column Definitions
// ============================================================================

fn default_nullable() -> bool {
    true
}

/// Column declared by an entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    #[serde(flatten)]
    pub column_type: ColumnType,

    /// Whether the column allows NULL values (default: true)
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Part of the primary key (default: false)
    #[serde(default)]
    pub is_key: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDefinition {
    /// Create a new nullable column definition
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            is_key: false,
            comment: None,
        }
    }

    /// Set the column as non-nullable
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column as primary key; key columns are never nullable
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self.nullable = false;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
