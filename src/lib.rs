//! # dynamic-sql
//!
//! Dialect-agnostic SQL generation from dynamic object shapes.
//!
//! Entities, filter maps and annotated search objects are turned into
//! parameterized SQL text plus a named-parameter bag, which an executor then
//! runs against a live connection. A PostgreSQL executor on sqlx is included.
//!
//! ## Features
//!
//! - **Field Reflection**: Any entity, map or serialized shape becomes an ordered list of fields
//! - **Condition Building**: Fluent WHERE fragments, or generated from annotated search objects
//! - **Dialects**: Standard (`LIMIT/OFFSET`, `@name`) and Oracle-style (`OFFSET … FETCH NEXT`, `:name`)
//! - **Paging**: Count and page statements that share one parameter bag; empty pages skip the page query
//! - **Logical Delete**: Delete and restore flip a flag column for entities that declare one
//! - **Transactions**: `begin` on a pool-backed database; batch inserts commit or roll back together
//! - **Schema Diff**: Compare entity columns with the live database and report the required steps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamic_sql::{
//!     Database, DatabaseConfig, DynamicSource, Entity, OrderBy, PageRequest, Where, dynamic_fields,
//! };
//!
//! #[derive(serde::Serialize, sqlx::FromRow)]
//! struct Product {
//!     id: i64,
//!     name: String,
//!     in_stock: bool,
//! }
//!
//! dynamic_fields!(Product {
//!     id => |d| d.key(),
//!     name,
//!     in_stock,
//! });
//!
//! impl Entity for Product {
//!     const TABLE: &'static str = "products";
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::builder("postgres://localhost/mydb").build();
//!     let db = Database::connect(&config).await?;
//!
//!     db.insert(&Product { id: 1, name: "Blue Widget".into(), in_stock: true }).await?;
//!
//!     let filter = serde_json::json!({ "in_stock": true });
//!     let page = db
//!         .query_page::<Product, Product>(
//!             Where::Fields(DynamicSource::from(&filter)),
//!             OrderBy::asc("name"),
//!             PageRequest::new(1, 10),
//!         )
//!         .await?;
//!
//!     println!("{} products in stock", page.total_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The database is configured using `DatabaseConfig`:
//!
//! ```rust
//! use std::time::Duration;
//! use dynamic_sql::{DatabaseConfig, DialectKind};
//!
//! let config = DatabaseConfig::builder("postgres://localhost/mydb")
//!     .dialect(DialectKind::Standard)      // Default dialect
//!     .timeout(Duration::from_secs(30))    // Per-statement timeout
//!     .max_connections(10)                 // Pool size (default)
//!     .log_statements(true)                // DEBUG log of every statement (default)
//!     .build();
//! ```

pub mod command;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod executor;
pub mod field;
pub mod migration;
pub mod params;
pub mod query;
pub mod sql;
pub mod types;

// Re-export main types for convenience
pub use command::CommandBuilder;
pub use config::{DatabaseConfig, DatabaseConfigBuilder};
pub use database::Database;
pub use entity::{Entity, LogicalDelete, TableName};
pub use error::{DynamicSqlError, Result};
pub use executor::{Executor, FromDbRow, PgExecutor, PgTxExecutor};
pub use field::{
    ConditionOperation, DynamicField, DynamicFields, DynamicSource, FieldDescriptor, FieldRegistry,
    SearchAnnotation, WhenNull,
};
pub use migration::{
    MigrationStep, PgIntrospector, SchemaIntrospector, TableDiff, TableModel, diff_table, plan,
};
pub use params::{Parameters, SqlFragment, Statement};
pub use query::{OrderBy, Page, PageRequest, PagedQuery, QueryBuilder, Where};
pub use types::{ColumnDefinition, ColumnType};

// Re-export SQL utilities for advanced users
pub use sql::condition::ConditionBuilder;
pub use sql::ddl::DdlGenerator;
pub use sql::dialect::{DialectKind, Direction, OracleDialect, SqlDialect, StandardDialect};
pub use sql::sanitize::{quote_identifier, validate_parameter_name};
