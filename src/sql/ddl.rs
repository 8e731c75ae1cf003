//! DDL rendering for schema diffs
//!
//! Turns the steps of a [`TableDiff`] into PostgreSQL statements an operator
//! can apply by hand. Nothing here touches the database.

use crate::entity::TableName;
use crate::migration::{ColumnInfo, MigrationStep, TableDiff};
use crate::sql::dialect::SqlDialect;
use crate::types::ColumnDefinition;

/// DDL generator for entity tables
pub struct DdlGenerator<'a> {
    dialect: &'a dyn SqlDialect,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator quoting identifiers the dialect's way
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// Statements for every step of `diff`, in step order
    pub fn generate_script(&self, diff: &TableDiff) -> Vec<String> {
        let table = diff.table_name();
        let mut statements = Vec::new();

        for step in &diff.steps {
            match step {
                MigrationStep::CreateTable => {
                    let columns: Vec<&ColumnDefinition> =
                        diff.fields.iter().filter_map(|f| f.model.as_ref()).collect();
                    statements.push(self.generate_create_table(&table, &columns));
                    if let Some(comment) = &diff.comment {
                        statements.push(self.generate_table_comment(&table, Some(comment)));
                    }
                    statements.extend(columns.iter().filter_map(|c| {
                        c.comment
                            .as_deref()
                            .map(|text| self.generate_column_comment(&table, &c.name, Some(text)))
                    }));
                }
                MigrationStep::AddColumn(name) => {
                    if let Some(col) = Self::model_column(diff, name) {
                        statements.extend(self.generate_add_column(&table, col));
                    }
                }
                MigrationStep::AlterColumn(name) => {
                    let field = diff.fields.iter().find(|f| &f.name == name);
                    if let Some((col, db)) = field.and_then(|f| f.model.as_ref().zip(f.db.as_ref())) {
                        statements.extend(self.generate_alter_column(&table, col, db));
                    }
                }
                MigrationStep::DropColumn(name) => {
                    statements.push(self.generate_drop_column(&table, name));
                }
            }
        }

        statements
    }

    fn model_column<'d>(diff: &'d TableDiff, name: &str) -> Option<&'d ColumnDefinition> {
        diff.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.model.as_ref())
    }

    /// Generate CREATE TABLE statement, with a primary key over the key columns
    pub fn generate_create_table(&self, table: &TableName, columns: &[&ColumnDefinition]) -> String {
        let mut column_defs: Vec<String> = columns
            .iter()
            .map(|col| self.format_column_definition(col))
            .collect();

        let keys: Vec<String> = columns
            .iter()
            .filter(|c| c.is_key)
            .map(|c| self.dialect.quote_identifier(&c.name))
            .collect();
        if !keys.is_empty() {
            column_defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE {} ({})",
            self.dialect.format_table_name(table),
            column_defs.join(", ")
        )
    }

    /// ADD COLUMN, plus its comment if it has one
    pub fn generate_add_column(&self, table: &TableName, col: &ColumnDefinition) -> Vec<String> {
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.dialect.format_table_name(table),
            self.format_column_definition(col)
        )];
        if let Some(comment) = &col.comment {
            statements.push(self.generate_column_comment(table, &col.name, Some(comment)));
        }
        statements
    }

    /// Statements that change the live column `db` into `col`
    pub fn generate_alter_column(
        &self,
        table: &TableName,
        col: &ColumnDefinition,
        db: &ColumnInfo,
    ) -> Vec<String> {
        let quoted_table = self.dialect.format_table_name(table);
        let quoted_column = self.dialect.quote_identifier(&db.name);
        let mut statements = Vec::new();

        // Type change
        if !col.column_type.matches_db_type(&db.data_type) {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                quoted_table,
                quoted_column,
                col.column_type.to_sql_type()
            ));
        }

        // Nullable change
        if col.nullable != db.nullable {
            let constraint = if col.nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            };
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {}",
                quoted_table, quoted_column, constraint
            ));
        }

        if col.comment.as_deref().unwrap_or("") != db.comment.as_deref().unwrap_or("") {
            statements.push(self.generate_column_comment(table, &db.name, col.comment.as_deref()));
        }

        statements
    }

    pub fn generate_drop_column(&self, table: &TableName, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.dialect.format_table_name(table),
            self.dialect.quote_identifier(column)
        )
    }

    pub fn generate_table_comment(&self, table: &TableName, comment: Option<&str>) -> String {
        format!(
            "COMMENT ON TABLE {} IS {}",
            self.dialect.format_table_name(table),
            comment_literal(comment)
        )
    }

    pub fn generate_column_comment(
        &self,
        table: &TableName,
        column: &str,
        comment: Option<&str>,
    ) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            self.dialect.format_table_name(table),
            self.dialect.quote_identifier(column),
            comment_literal(comment)
        )
    }

    /// Format a single column definition for CREATE TABLE or ALTER TABLE ADD COLUMN
    pub fn format_column_definition(&self, col: &ColumnDefinition) -> String {
        let mut parts = vec![
            self.dialect.quote_identifier(&col.name),
            col.column_type.to_sql_type(),
        ];

        // NOT NULL constraint
        if !col.nullable {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }
}

/// String literal for COMMENT ON, or `NULL` to remove the comment
fn comment_literal(comment: Option<&str>) -> String {
    match comment {
        Some(text) if !text.is_empty() => format!("'{}'", text.replace('\'', "''")),
        _ => "NULL".to_string(),
    }
}
