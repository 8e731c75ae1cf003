//! SQL dialects
//!
//! A dialect renders table names, field references, clauses and whole
//! statements for one backend. The default method bodies hold the rendering
//! shared by every backend; implementations override parameter prefix and
//! paging. Every method is a pure function of its arguments.

mod oracle;
mod standard;

pub use oracle::OracleDialect;
pub use standard::StandardDialect;

use std::fmt;

use crate::entity::TableName;
use crate::sql::sanitize::quote_identifier;

/// Sort direction of an ORDER BY column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `asc` / `desc` in any case
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Input of [`SqlDialect::format_where_sql`]
#[derive(Debug, Clone, Copy)]
pub enum WhereSql<'a> {
    /// Equality on each field, bound to a parameter of the same name
    Fields(&'a [String]),
    /// Caller supplied condition text
    Raw(&'a str),
}

/// Input of [`SqlDialect::format_order_sql`]
#[derive(Debug, Clone, Copy)]
pub enum OrderSql<'a> {
    Fields(&'a [(String, Direction)]),
    Raw(&'a str),
}

/// Backend specific SQL rendering
pub trait SqlDialect: fmt::Debug + Send + Sync {
    /// Name shown in statement logs, accepted by [`DialectKind::from_name`]
    fn name(&self) -> &'static str;

    /// Character that introduces a named placeholder
    fn parameter_prefix(&self) -> char;

    /// Suffix that restricts a query to its first row
    fn one_row_suffix(&self) -> String;

    /// Suffix selecting `rows` rows of page `page` (1-based)
    fn page_suffix(&self, page: u32, rows: u32) -> String;

    fn quote_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }

    fn placeholder(&self, name: &str) -> String {
        format!("{}{}", self.parameter_prefix(), name)
    }

    fn format_table_name(&self, table: &TableName) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }

    /// Field reference, qualified by `alias` unless it is empty
    fn format_field(&self, alias: &str, field: &str) -> String {
        if alias.is_empty() {
            self.quote_identifier(field)
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(alias),
                self.quote_identifier(field)
            )
        }
    }

    /// WHERE clause with a leading space, or an empty string
    fn format_where_sql(&self, clause: WhereSql<'_>) -> String {
        match clause {
            WhereSql::Fields(fields) if fields.is_empty() => String::new(),
            WhereSql::Fields(fields) => {
                let conditions: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} = {}", self.quote_identifier(f), self.placeholder(f)))
                    .collect();
                format!(" WHERE {}", conditions.join(" AND "))
            }
            WhereSql::Raw(text) if text.trim().is_empty() => String::new(),
            WhereSql::Raw(text) => format!(" WHERE {}", text.trim()),
        }
    }

    /// ORDER BY clause with a leading space, or an empty string
    fn format_order_sql(&self, clause: OrderSql<'_>) -> String {
        match clause {
            OrderSql::Fields(fields) if fields.is_empty() => String::new(),
            OrderSql::Fields(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(f, dir)| format!("{} {}", self.quote_identifier(f), dir.as_sql()))
                    .collect();
                format!(" ORDER BY {}", parts.join(", "))
            }
            OrderSql::Raw(text) if text.trim().is_empty() => String::new(),
            OrderSql::Raw(text) => format!(" ORDER BY {}", text.trim()),
        }
    }

    fn format_query_sql(
        &self,
        fields: &str,
        table_join: &str,
        where_sql: &str,
        order_sql: &str,
        is_one: bool,
    ) -> String {
        let fields = if fields.trim().is_empty() { "*" } else { fields };
        let mut sql = format!("SELECT {} FROM {}{}{}", fields, table_join, where_sql, order_sql);
        if is_one {
            sql.push_str(&self.one_row_suffix());
        }
        sql
    }

    fn format_query_page_sql(
        &self,
        page: u32,
        rows: u32,
        fields: &str,
        table_join: &str,
        where_sql: &str,
        order_sql: &str,
    ) -> String {
        let sql = self.format_query_sql(fields, table_join, where_sql, order_sql, false);
        self.format_page_sql(page, rows, &sql)
    }

    /// Append paging to an already complete SELECT
    fn format_page_sql(&self, page: u32, rows: u32, sql: &str) -> String {
        format!("{}{}", sql, self.page_suffix(page, rows))
    }

    fn format_count_sql(&self, table_join: &str, where_sql: &str) -> String {
        format!("SELECT COUNT(*) FROM {}{}", table_join, where_sql)
    }

    fn format_insert_sql(&self, table: &str, fields: &[String]) -> String {
        let columns: Vec<String> = fields.iter().map(|f| self.quote_identifier(f)).collect();
        let values: Vec<String> = fields.iter().map(|f| self.placeholder(f)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            values.join(", ")
        )
    }

    /// UPDATE with SET parameters named after the fields and WHERE parameters
    /// named `<where_prefix><field>`
    fn format_update_sql(
        &self,
        table: &str,
        update_fields: &[String],
        where_fields: &[String],
        where_prefix: &str,
    ) -> String {
        let sets: Vec<String> = update_fields
            .iter()
            .map(|f| format!("{} = {}", self.quote_identifier(f), self.placeholder(f)))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        if !where_fields.is_empty() {
            let conditions: Vec<String> = where_fields
                .iter()
                .map(|f| {
                    format!(
                        "{} = {}",
                        self.quote_identifier(f),
                        self.placeholder(&format!("{}{}", where_prefix, f))
                    )
                })
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql
    }

    fn format_delete_sql(&self, table: &str, where_sql: &str) -> String {
        format!("DELETE FROM {}{}", table, where_sql)
    }

    /// UPDATE that sets the logical delete flag to the value bound as `flag_param`
    fn format_logical_delete_restore_sql(
        &self,
        table: &str,
        flag_field: &str,
        flag_param: &str,
        where_sql: &str,
    ) -> String {
        format!(
            "UPDATE {} SET {} = {}{}",
            table,
            self.quote_identifier(flag_field),
            self.placeholder(flag_param),
            where_sql
        )
    }
}

/// Backend selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialectKind {
    #[default]
    Standard,
    Oracle,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Self::Standard => &StandardDialect,
            Self::Oracle => &OracleDialect,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "standard" | "postgres" | "postgresql" | "mysql" | "sqlite" => Some(Self::Standard),
            "oracle" => Some(Self::Oracle),
            _ => None,
        }
    }
}

/// Offset of the first row of `page` (1-based)
pub(crate) fn page_offset(page: u32, rows: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(rows)
}
