//! Statement execution
//!
//! [`Executor`] is the seam between built statements and a live connection.
//! [`PgExecutor`] runs them on a PostgreSQL pool through sqlx and
//! [`PgTxExecutor`] inside one open transaction; tests use an in-memory
//! executor whose rows are JSON values.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;
use crate::error::{DynamicSqlError, Result};
use crate::params::Statement;
use crate::sql::dialect::SqlDialect;
use crate::sql::placeholder::{PositionalSql, expand};

/// Runs statements against a database
#[async_trait]
pub trait Executor: Send + Sync {
    type Row: Send;

    /// Dialect the statements for this executor must be built with
    fn dialect(&self) -> &'static dyn SqlDialect;

    async fn query_one(&self, statement: &Statement) -> Result<Option<Self::Row>>;

    async fn query_list(&self, statement: &Statement) -> Result<Vec<Self::Row>>;

    /// Number of affected rows
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// First column of the first row, if any
    async fn execute_scalar(&self, statement: &Statement) -> Result<Option<i64>>;

    /// Run all statements as one unit, returning the total affected rows
    ///
    /// Runs them one after another; executors that own a pool override this
    /// to wrap the batch in a transaction.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        let mut affected = 0;
        for statement in statements {
            affected += self.execute(statement).await?;
        }
        Ok(affected)
    }
}

/// Conversion of an executor row into a caller type
pub trait FromDbRow<R>: Sized {
    fn from_db_row(row: R) -> Result<Self>;
}

impl<T> FromDbRow<PgRow> for T
where
    T: for<'r> sqlx::FromRow<'r, PgRow>,
{
    fn from_db_row(row: PgRow) -> Result<Self> {
        Ok(T::from_row(&row)?)
    }
}

impl<T> FromDbRow<Value> for T
where
    T: DeserializeOwned,
{
    fn from_db_row(row: Value) -> Result<Self> {
        Ok(serde_json::from_value(row)?)
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Execution settings shared by pool and transaction executors
#[derive(Debug, Clone, Copy)]
struct Settings {
    dialect: &'static dyn SqlDialect,
    timeout: Option<Duration>,
    log_statements: bool,
}

impl Settings {
    fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            dialect: config.dialect.dialect(),
            timeout: config.timeout,
            log_statements: config.log_statements,
        }
    }

    fn prepare(
        &self,
        operation: &'static str,
        in_transaction: bool,
        statement: &Statement,
    ) -> Result<PositionalSql> {
        if self.log_statements {
            tracing::debug!(
                operation,
                dialect = self.dialect.name(),
                in_transaction,
                sql = %statement.sql,
                params = statement.params.len(),
                "executing statement"
            );
        }
        expand(&statement.sql, self.dialect.parameter_prefix(), &statement.params)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, sqlx::Error>> + Send,
    ) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DynamicSqlError::Timeout(limit))?
                .map_err(DynamicSqlError::from),
            None => Ok(fut.await?),
        }
    }
}

/// Bind a JSON value according to its variant
///
/// Expansion inlines nulls, so `Null` only arrives here from a caller that
/// bypassed it.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value)),
    }
}

fn build_query(positional: &PositionalSql) -> Query<'_, Postgres, PgArguments> {
    positional
        .values
        .iter()
        .fold(sqlx::query(&positional.sql), bind_value)
}

fn first_column(row: Option<PgRow>) -> Result<Option<i64>> {
    match row {
        Some(row) => Ok(row.try_get::<Option<i64>, _>(0)?),
        None => Ok(None),
    }
}

/// Executor over a sqlx PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
    settings: Settings,
}

impl PgExecutor {
    /// Wrap an existing pool, using the configured dialect and timeout
    pub fn from_pool(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            settings: Settings::from_config(config),
        }
    }

    /// Open a pool for `config.database_url`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::from_pool(pool, config))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start a transaction; statements run through the returned executor
    /// until it is committed or rolled back
    ///
    /// Dropping it without either rolls the transaction back.
    pub async fn begin(&self) -> Result<PgTxExecutor> {
        let tx = self.pool.begin().await?;
        tracing::debug!("transaction started");
        Ok(PgTxExecutor {
            tx: Mutex::new(tx),
            settings: self.settings,
        })
    }
}

#[async_trait]
impl Executor for PgExecutor {
    type Row = PgRow;

    fn dialect(&self) -> &'static dyn SqlDialect {
        self.settings.dialect
    }

    async fn query_one(&self, statement: &Statement) -> Result<Option<PgRow>> {
        let positional = self.settings.prepare("query_one", false, statement)?;
        self.settings
            .with_timeout(build_query(&positional).fetch_optional(&self.pool))
            .await
    }

    async fn query_list(&self, statement: &Statement) -> Result<Vec<PgRow>> {
        let positional = self.settings.prepare("query_list", false, statement)?;
        self.settings
            .with_timeout(build_query(&positional).fetch_all(&self.pool))
            .await
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let positional = self.settings.prepare("execute", false, statement)?;
        let result = self
            .settings
            .with_timeout(build_query(&positional).execute(&self.pool))
            .await?;
        Ok(result.rows_affected())
    }

    async fn execute_scalar(&self, statement: &Statement) -> Result<Option<i64>> {
        let positional = self.settings.prepare("execute_scalar", false, statement)?;
        let row = self
            .settings
            .with_timeout(build_query(&positional).fetch_optional(&self.pool))
            .await?;
        first_column(row)
    }

    /// All statements in one transaction; a failure rolls every one back
    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        let tx = self.begin().await?;
        match tx.execute_batch(statements).await {
            Ok(affected) => {
                tx.commit().await?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed batch failed");
                }
                Err(err)
            }
        }
    }
}

/// Executor bound to one open PostgreSQL transaction
pub struct PgTxExecutor {
    tx: Mutex<Transaction<'static, Postgres>>,
    settings: Settings,
}

impl fmt::Debug for PgTxExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTxExecutor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PgTxExecutor {
    pub async fn commit(self) -> Result<()> {
        self.tx.into_inner().commit().await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.into_inner().rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl Executor for PgTxExecutor {
    type Row = PgRow;

    fn dialect(&self) -> &'static dyn SqlDialect {
        self.settings.dialect
    }

    async fn query_one(&self, statement: &Statement) -> Result<Option<PgRow>> {
        let positional = self.settings.prepare("query_one", true, statement)?;
        let mut tx = self.tx.lock().await;
        self.settings
            .with_timeout(build_query(&positional).fetch_optional(&mut **tx))
            .await
    }

    async fn query_list(&self, statement: &Statement) -> Result<Vec<PgRow>> {
        let positional = self.settings.prepare("query_list", true, statement)?;
        let mut tx = self.tx.lock().await;
        self.settings
            .with_timeout(build_query(&positional).fetch_all(&mut **tx))
            .await
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let positional = self.settings.prepare("execute", true, statement)?;
        let mut tx = self.tx.lock().await;
        let result = self
            .settings
            .with_timeout(build_query(&positional).execute(&mut **tx))
            .await?;
        Ok(result.rows_affected())
    }

    async fn execute_scalar(&self, statement: &Statement) -> Result<Option<i64>> {
        let positional = self.settings.prepare("execute_scalar", true, statement)?;
        let mut tx = self.tx.lock().await;
        let row = self
            .settings
            .with_timeout(build_query(&positional).fetch_optional(&mut **tx))
            .await?;
        first_column(row)
    }
}
