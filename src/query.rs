//! Query assembly: single row, list, count and paged queries
//!
//! WHERE and ORDER inputs each come in one of three shapes: a pre-built
//! fragment with its own parameters, raw SQL text, or an object whose fields
//! are reflected into a column list. The dialect renders whichever shape is
//! presented.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;
use crate::error::{DynamicSqlError, Result};
use crate::field::{DynamicFields, DynamicSource, FieldRegistry};
use crate::params::{Parameters, SqlFragment, Statement};
use crate::sql::dialect::{Direction, OrderSql, SqlDialect, WhereSql, page_offset};
use crate::sql::sanitize::validate_parameter_name;

// ============================================================================
// WHERE / ORDER inputs
// ============================================================================

/// Filter of a query or command
#[derive(Debug, Clone, Default)]
pub enum Where<'a> {
    /// No filter
    #[default]
    None,
    /// Condition text with its parameters, e.g. from a `ConditionBuilder`
    Fragment(SqlFragment),
    /// Condition text that binds nothing
    Raw(String),
    /// Equality on every reflected field, each bound under its own name
    Fields(DynamicSource<'a>),
}

impl<'a> Where<'a> {
    /// Filter on the fields of a typed object
    pub fn object<T: DynamicFields>(obj: &'a T) -> Self {
        Self::Fields(DynamicSource::object(obj))
    }

    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::Fields(source) => source.is_none(),
            _ => false,
        }
    }

    /// Render the WHERE clause (with leading space) and the parameters it binds
    pub fn render(
        &self,
        dialect: &dyn SqlDialect,
        registry: &FieldRegistry,
    ) -> Result<(String, Parameters)> {
        match self {
            Self::None => Ok((String::new(), Parameters::new())),
            Self::Fragment(fragment) => Ok((
                dialect.format_where_sql(WhereSql::Raw(&fragment.sql)),
                fragment.params.clone(),
            )),
            Self::Raw(sql) => Ok((dialect.format_where_sql(WhereSql::Raw(sql)), Parameters::new())),
            Self::Fields(source) => {
                let fields = registry.reflect(source);
                let names = fields
                    .iter()
                    .map(|f| validate_parameter_name(&f.name).map(|_| f.name.clone()))
                    .collect::<Result<Vec<_>>>()?;
                Ok((
                    dialect.format_where_sql(WhereSql::Fields(&names)),
                    Parameters::from_fields(&fields, ""),
                ))
            }
        }
    }
}

impl From<SqlFragment> for Where<'_> {
    fn from(fragment: SqlFragment) -> Self {
        Self::Fragment(fragment)
    }
}

impl From<&str> for Where<'_> {
    fn from(sql: &str) -> Self {
        Self::Raw(sql.to_string())
    }
}

impl From<String> for Where<'_> {
    fn from(sql: String) -> Self {
        Self::Raw(sql)
    }
}

impl<'a> From<DynamicSource<'a>> for Where<'a> {
    fn from(source: DynamicSource<'a>) -> Self {
        Self::Fields(source)
    }
}

/// Sort order of a query
#[derive(Debug, Clone, Default)]
pub enum OrderBy<'a> {
    #[default]
    None,
    /// Order text with parameters, merged into the statement's bag
    Fragment(SqlFragment),
    Raw(String),
    /// Field → `"asc"` / `"desc"` mapping
    Fields(DynamicSource<'a>),
    Columns(Vec<(String, Direction)>),
}

impl<'a> OrderBy<'a> {
    pub fn asc(column: impl Into<String>) -> Self {
        Self::Columns(vec![(column.into(), Direction::Asc)])
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::Columns(vec![(column.into(), Direction::Desc)])
    }

    /// Render the ORDER BY clause (with leading space) and its parameters
    pub fn render(
        &self,
        dialect: &dyn SqlDialect,
        registry: &FieldRegistry,
    ) -> Result<(String, Parameters)> {
        match self {
            Self::None => Ok((String::new(), Parameters::new())),
            Self::Fragment(fragment) => Ok((
                dialect.format_order_sql(OrderSql::Raw(&fragment.sql)),
                fragment.params.clone(),
            )),
            Self::Raw(sql) => Ok((dialect.format_order_sql(OrderSql::Raw(sql)), Parameters::new())),
            Self::Fields(source) => {
                let columns = registry
                    .reflect(source)
                    .into_iter()
                    .map(|f| {
                        let direction = match &f.value {
                            Value::String(s) => Direction::from_name(s),
                            _ => None,
                        }
                        .ok_or_else(|| {
                            DynamicSqlError::validation(format!(
                                "order of '{}' must be \"asc\" or \"desc\", got {}",
                                f.name, f.value
                            ))
                        })?;
                        Ok::<_, DynamicSqlError>((f.name, direction))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((dialect.format_order_sql(OrderSql::Fields(&columns)), Parameters::new()))
            }
            Self::Columns(columns) => Ok((
                dialect.format_order_sql(OrderSql::Fields(columns)),
                Parameters::new(),
            )),
        }
    }
}

impl From<SqlFragment> for OrderBy<'_> {
    fn from(fragment: SqlFragment) -> Self {
        Self::Fragment(fragment)
    }
}

impl From<&str> for OrderBy<'_> {
    fn from(sql: &str) -> Self {
        Self::Raw(sql.to_string())
    }
}

impl From<String> for OrderBy<'_> {
    fn from(sql: String) -> Self {
        Self::Raw(sql)
    }
}

impl<'a> From<DynamicSource<'a>> for OrderBy<'a> {
    fn from(source: DynamicSource<'a>) -> Self {
        Self::Fields(source)
    }
}

impl From<Vec<(String, Direction)>> for OrderBy<'_> {
    fn from(columns: Vec<(String, Direction)>) -> Self {
        Self::Columns(columns)
    }
}

// ============================================================================
// Paging
// ============================================================================

/// Requested page window; both values are at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPageRequest")]
pub struct PageRequest {
    page: u32,
    rows: u32,
}

/// Wire form of a page request, clamped on the way in
#[derive(Deserialize)]
struct RawPageRequest {
    page: u32,
    rows: u32,
}

impl From<RawPageRequest> for PageRequest {
    fn from(raw: RawPageRequest) -> Self {
        Self::new(raw.page, raw.rows)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, rows: 20 }
    }
}

impl PageRequest {
    pub fn new(page: u32, rows: u32) -> Self {
        Self {
            page: page.max(1),
            rows: rows.max(1),
        }
    }

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Rows per page
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Index of the first row of this page
    pub fn offset(&self) -> u64 {
        page_offset(self.page, self.rows)
    }

    /// Whether any row of a result with `total_count` rows falls in this page
    pub fn has_rows(&self, total_count: i64) -> bool {
        total_count > 0 && total_count as u64 > self.offset()
    }
}

/// One page of results and the total number of matching rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_count: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(total_count: i64) -> Self {
        Self {
            total_count,
            items: Vec::new(),
        }
    }
}

/// Count and page statements sharing one set of WHERE parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PagedQuery {
    pub count: Statement,
    pub page: Statement,
    pub request: PageRequest,
}

// ============================================================================
// Query builder
// ============================================================================

/// Assembles SELECT statements for one entity table or a join expression
#[derive(Debug)]
pub struct QueryBuilder<'a> {
    dialect: &'static dyn SqlDialect,
    registry: &'a FieldRegistry,
    fields: String,
    table: SqlFragment,
    filter: Where<'a>,
    order: OrderBy<'a>,
}

impl<'a> QueryBuilder<'a> {
    /// Query the table mapped by `E`
    pub fn for_entity<E: Entity>(dialect: &'static dyn SqlDialect, registry: &'a FieldRegistry) -> Self {
        let table = dialect.format_table_name(&E::table_name());
        Self::from_join(dialect, registry, SqlFragment::raw(table))
    }

    /// Query a join expression; its parameters are bound ahead of the filter's
    pub fn from_join(
        dialect: &'static dyn SqlDialect,
        registry: &'a FieldRegistry,
        join: SqlFragment,
    ) -> Self {
        Self {
            dialect,
            registry,
            fields: String::new(),
            table: join,
            filter: Where::None,
            order: OrderBy::None,
        }
    }

    /// Column list; empty selects `*`
    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn filter(mut self, filter: impl Into<Where<'a>>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn order_by(mut self, order: impl Into<OrderBy<'a>>) -> Self {
        self.order = order.into();
        self
    }

    fn parts(&self) -> Result<(String, String, Parameters)> {
        if self.table.is_empty() {
            return Err(DynamicSqlError::build("table or join expression is empty"));
        }

        let (where_sql, where_params) = self.filter.render(self.dialect, self.registry)?;
        let (order_sql, order_params) = self.order.render(self.dialect, self.registry)?;

        let mut params = self.table.params.clone();
        params.merge(where_params)?;
        params.merge(order_params)?;

        Ok((where_sql, order_sql, params))
    }

    fn finish(sql: String, params: Parameters) -> Result<Statement> {
        if sql.trim().is_empty() {
            return Err(DynamicSqlError::build("generated SQL is empty"));
        }
        Ok(Statement::new(sql, params))
    }

    /// First matching row only
    pub fn build_one(&self) -> Result<Statement> {
        self.build_query(true)
    }

    pub fn build_list(&self) -> Result<Statement> {
        self.build_query(false)
    }

    fn build_query(&self, is_one: bool) -> Result<Statement> {
        let (where_sql, order_sql, params) = self.parts()?;
        let sql = self.dialect.format_query_sql(
            &self.fields,
            &self.table.sql,
            &where_sql,
            &order_sql,
            is_one,
        );
        Self::finish(sql, params)
    }

    /// `SELECT COUNT(*)` over the same table and filter; ORDER is not rendered
    pub fn build_count(&self) -> Result<Statement> {
        if self.table.is_empty() {
            return Err(DynamicSqlError::build("table or join expression is empty"));
        }
        let (where_sql, where_params) = self.filter.render(self.dialect, self.registry)?;
        let mut params = self.table.params.clone();
        params.merge(where_params)?;

        let sql = self.dialect.format_count_sql(&self.table.sql, &where_sql);
        Self::finish(sql, params)
    }

    pub fn build_page(&self, request: PageRequest) -> Result<PagedQuery> {
        let count = self.build_count()?;

        let (where_sql, order_sql, params) = self.parts()?;
        let sql = self.dialect.format_query_page_sql(
            request.page(),
            request.rows(),
            &self.fields,
            &self.table.sql,
            &where_sql,
            &order_sql,
        );
        let page = Self::finish(sql, params)?;

        Ok(PagedQuery {
            count,
            page,
            request,
        })
    }
}
