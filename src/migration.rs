//! Schema diff reporting
//!
//! Compares the columns an entity declares with what the database reports and
//! lists the steps that would bring the table in line. Steps are only
//! reported (and optionally rendered as DDL); nothing is executed.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

use crate::entity::{Entity, TableName};
use crate::error::Result;
use crate::types::ColumnDefinition;

/// Entity whose column model can be compared with the database
pub trait TableModel: Entity {
    fn columns() -> Vec<ColumnDefinition>;

    fn table_comment() -> Option<&'static str> {
        None
    }
}

/// A table as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub comment: Option<String>,
}

/// A column as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub comment: Option<String>,
    pub is_key: bool,
}

/// Source of the live schema
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn tables(&self) -> Result<Vec<TableInfo>>;

    async fn table_fields(&self, table: &str) -> Result<Vec<ColumnInfo>>;
}

// ============================================================================
// Diff
// ============================================================================

/// One change needed to bring a table in line with its entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStep {
    CreateTable,
    AddColumn(String),
    AlterColumn(String),
    DropColumn(String),
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable => f.write_str("create table"),
            Self::AddColumn(name) => write!(f, "add column {}", name),
            Self::AlterColumn(name) => write!(f, "alter column {}", name),
            Self::DropColumn(name) => write!(f, "drop column {}", name),
        }
    }
}

/// Model and database view of one column; either side may be missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub name: String,
    pub model: Option<ColumnDefinition>,
    pub db: Option<ColumnInfo>,
}

impl FieldComparison {
    fn is_key(&self) -> bool {
        self.model.as_ref().map(|m| m.is_key).unwrap_or(false)
            || self.db.as_ref().map(|d| d.is_key).unwrap_or(false)
    }
}

/// Result of comparing one entity with its table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    pub table: String,
    pub schema: Option<String>,
    pub comment: Option<String>,
    pub db_comment: Option<String>,
    pub db_exists: bool,
    /// Key columns first, then model order, then database-only columns
    pub fields: Vec<FieldComparison>,
    pub steps: Vec<MigrationStep>,
}

impl TableDiff {
    pub fn is_up_to_date(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn table_name(&self) -> TableName {
        let table = TableName::new(&self.table);
        match &self.schema {
            Some(schema) => table.in_schema(schema),
            None => table,
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn column_differs(model: &ColumnDefinition, db: &ColumnInfo) -> bool {
    !model.column_type.matches_db_type(&db.data_type)
        || model.nullable != db.nullable
        || model.comment.as_deref().unwrap_or("") != db.comment.as_deref().unwrap_or("")
}

/// Compare declared columns with the live table, if there is one
///
/// Column names match case-insensitively.
pub fn diff_table(
    table: &TableName,
    comment: Option<&str>,
    columns: &[ColumnDefinition],
    live: Option<(&TableInfo, &[ColumnInfo])>,
) -> TableDiff {
    let mut steps = Vec::new();
    let mut fields = Vec::with_capacity(columns.len());

    match live {
        None => {
            steps.push(MigrationStep::CreateTable);
            fields.extend(columns.iter().map(|c| FieldComparison {
                name: c.name.clone(),
                model: Some(c.clone()),
                db: None,
            }));
        }
        Some((_, db_columns)) => {
            for column in columns {
                let db = db_columns.iter().find(|d| same_name(&d.name, &column.name));
                match db {
                    None => steps.push(MigrationStep::AddColumn(column.name.clone())),
                    Some(db) if column_differs(column, db) => {
                        steps.push(MigrationStep::AlterColumn(column.name.clone()))
                    }
                    Some(_) => {}
                }
                fields.push(FieldComparison {
                    name: column.name.clone(),
                    model: Some(column.clone()),
                    db: db.cloned(),
                });
            }

            for db in db_columns {
                if !columns.iter().any(|c| same_name(&c.name, &db.name)) {
                    steps.push(MigrationStep::DropColumn(db.name.clone()));
                    fields.push(FieldComparison {
                        name: db.name.clone(),
                        model: None,
                        db: Some(db.clone()),
                    });
                }
            }
        }
    }

    // stable, so model order is kept within each group
    fields.sort_by_key(|f| !f.is_key());

    TableDiff {
        table: table.name.clone(),
        schema: table.schema.clone(),
        comment: comment.map(str::to_string),
        db_comment: live.and_then(|(info, _)| info.comment.clone()),
        db_exists: live.is_some(),
        fields,
        steps,
    }
}

/// Compare entity `M` with what `introspector` reports
pub async fn plan<M, I>(introspector: &I) -> Result<TableDiff>
where
    M: TableModel,
    I: SchemaIntrospector + ?Sized,
{
    let table = M::table_name();
    let columns = M::columns();

    let tables = introspector.tables().await?;
    let info = tables.iter().find(|t| same_name(&t.table_name, &table.name));

    let diff = match info {
        Some(info) => {
            let db_columns = introspector.table_fields(&info.table_name).await?;
            diff_table(&table, M::table_comment(), &columns, Some((info, &db_columns)))
        }
        None => diff_table(&table, M::table_comment(), &columns, None),
    };

    tracing::debug!(
        table = %table.name,
        steps = diff.steps.len(),
        "schema diff computed"
    );
    Ok(diff)
}

// ============================================================================
// PostgreSQL introspection
// ============================================================================

/// Reads tables and columns of one schema from `pg_catalog`
#[derive(Debug, Clone)]
pub struct PgIntrospector {
    pool: PgPool,
    schema: String,
}

impl PgIntrospector {
    /// Introspect the `public` schema
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, "public")
    }

    pub fn with_schema(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl SchemaIntrospector for PgIntrospector {
    async fn tables(&self) -> Result<Vec<TableInfo>> {
        let sql = r#"
            SELECT c.relname AS table_name,
                   obj_description(c.oid, 'pg_class') AS comment
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind IN ('r', 'p') AND n.nspname = $1
            ORDER BY c.relname
        "#;

        let rows = sqlx::query(sql).bind(&self.schema).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<TableInfo> {
                Ok(TableInfo {
                    table_name: row.try_get("table_name")?,
                    comment: row.try_get("comment")?,
                })
            })
            .collect()
    }

    async fn table_fields(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = r#"
            SELECT a.attname AS name,
                   format_type(a.atttypid, a.atttypmod) AS data_type,
                   NOT a.attnotnull AS nullable,
                   col_description(c.oid, a.attnum) AS comment,
                   EXISTS (
                       SELECT 1 FROM pg_catalog.pg_index i
                       WHERE i.indrelid = c.oid AND i.indisprimary AND a.attnum = ANY(i.indkey)
                   ) AS is_key
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;

        let rows = sqlx::query(sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo> {
                Ok(ColumnInfo {
                    name: row.try_get("name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: row.try_get("nullable")?,
                    comment: row.try_get("comment")?,
                    is_key: row.try_get("is_key")?,
                })
            })
            .collect()
    }
}
