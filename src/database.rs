//! Database - entry point that builds statements and runs them
//!
//! Every operation builds its statement completely before the first await, so
//! builder errors never leave partial work behind.

use std::sync::Arc;

use crate::command::CommandBuilder;
use crate::config::DatabaseConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::executor::{Executor, FromDbRow, PgExecutor, PgTxExecutor};
use crate::field::{DynamicSource, FieldRegistry};
use crate::params::Statement;
use crate::query::{OrderBy, Page, PageRequest, PagedQuery, QueryBuilder, Where};
use crate::sql::condition::ConditionBuilder;
use crate::sql::dialect::SqlDialect;

/// Statement builders bound to an executor
pub struct Database<X: Executor> {
    executor: X,
    registry: Arc<FieldRegistry>,
}

impl Database<PgExecutor> {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let executor = PgExecutor::connect(config).await?;
        Ok(Self::new(executor))
    }

    /// Start a transaction sharing this database's field registry
    pub async fn begin(&self) -> Result<Database<PgTxExecutor>> {
        let executor = self.executor.begin().await?;
        Ok(Database::with_registry(executor, Arc::clone(&self.registry)))
    }
}

impl Database<PgTxExecutor> {
    pub async fn commit(self) -> Result<()> {
        self.executor.commit().await
    }

    pub async fn rollback(self) -> Result<()> {
        self.executor.rollback().await
    }
}

impl<X: Executor> Database<X> {
    /// Use the executor with a fresh field registry
    pub fn new(executor: X) -> Self {
        Self::with_registry(executor, Arc::new(FieldRegistry::new()))
    }

    /// Share a field registry between several databases
    pub fn with_registry(executor: X, registry: Arc<FieldRegistry>) -> Self {
        Self { executor, registry }
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.executor.dialect()
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Query builder for `E`'s table
    pub fn query<E: Entity>(&self) -> QueryBuilder<'_> {
        QueryBuilder::for_entity::<E>(self.dialect(), &self.registry)
    }

    pub fn commands(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(self.dialect(), &self.registry)
    }

    /// Empty condition builder in this database's dialect
    pub fn condition(&self) -> ConditionBuilder {
        ConditionBuilder::new(self.dialect())
    }

    /// Condition built from an annotated search object
    pub fn search<E: Entity>(&self, search: &DynamicSource<'_>) -> ConditionBuilder {
        ConditionBuilder::from_search::<E>(self.dialect(), &self.registry, search)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn query_one<E, T>(&self, filter: Where<'_>, order: OrderBy<'_>) -> Result<Option<T>>
    where
        E: Entity,
        T: FromDbRow<X::Row>,
    {
        let statement = self.query::<E>().filter(filter).order_by(order).build_one()?;
        self.fetch_one(&statement).await
    }

    pub async fn query_list<E, T>(&self, filter: Where<'_>, order: OrderBy<'_>) -> Result<Vec<T>>
    where
        E: Entity,
        T: FromDbRow<X::Row>,
    {
        let statement = self.query::<E>().filter(filter).order_by(order).build_list()?;
        self.fetch_list(&statement).await
    }

    pub async fn query_count<E: Entity>(&self, filter: Where<'_>) -> Result<i64> {
        let statement = self.query::<E>().filter(filter).build_count()?;
        self.count(&statement).await
    }

    pub async fn query_page<E, T>(
        &self,
        filter: Where<'_>,
        order: OrderBy<'_>,
        request: PageRequest,
    ) -> Result<Page<T>>
    where
        E: Entity,
        T: FromDbRow<X::Row>,
    {
        let paged = self
            .query::<E>()
            .filter(filter)
            .order_by(order)
            .build_page(request)?;
        self.fetch_page(&paged).await
    }

    /// Run a single-row statement
    pub async fn fetch_one<T: FromDbRow<X::Row>>(&self, statement: &Statement) -> Result<Option<T>> {
        self.executor
            .query_one(statement)
            .await?
            .map(T::from_db_row)
            .transpose()
    }

    pub async fn fetch_list<T: FromDbRow<X::Row>>(&self, statement: &Statement) -> Result<Vec<T>> {
        self.executor
            .query_list(statement)
            .await?
            .into_iter()
            .map(T::from_db_row)
            .collect()
    }

    async fn count(&self, statement: &Statement) -> Result<i64> {
        Ok(self.executor.execute_scalar(statement).await?.unwrap_or(0))
    }

    /// Run the count statement, then the page statement if the page has rows
    pub async fn fetch_page<T: FromDbRow<X::Row>>(&self, paged: &PagedQuery) -> Result<Page<T>> {
        let total_count = self.count(&paged.count).await?;

        if !paged.request.has_rows(total_count) {
            tracing::debug!(
                total_count,
                page = paged.request.page(),
                rows = paged.request.rows(),
                "page is past the end of the result, skipping page query"
            );
            return Ok(Page::empty(total_count));
        }

        let items = self.fetch_list(&paged.page).await?;
        Ok(Page { total_count, items })
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub async fn insert<E: Entity>(&self, entity: &E) -> Result<u64> {
        let statement = self.commands().insert(entity)?;
        self.executor.execute(&statement).await
    }

    /// Insert every entity as one batch, returning the total number of inserted rows
    ///
    /// On a pool the batch runs in its own transaction, so a failing row
    /// leaves none of the others behind.
    pub async fn insert_many<E: Entity>(&self, entities: &[E]) -> Result<u64> {
        let statements = self.commands().insert_many(entities)?;
        self.executor.execute_batch(&statements).await
    }

    pub async fn update<E: Entity>(&self, data: DynamicSource<'_>, filter: Where<'_>) -> Result<u64> {
        let statement = self.commands().update::<E>(&data, &filter)?;
        self.run_optional(statement).await
    }

    /// Update an entity by its key fields
    pub async fn update_entity<E: Entity>(&self, entity: &E) -> Result<u64> {
        let statement = self.commands().update_entity(entity)?;
        self.run_optional(statement).await
    }

    pub async fn delete<E: Entity>(&self, filter: Where<'_>) -> Result<u64> {
        let statement = self.commands().delete::<E>(&filter)?;
        self.run_optional(statement).await
    }

    pub async fn restore<E: Entity>(&self, filter: Where<'_>) -> Result<u64> {
        let statement = self.commands().restore::<E>(&filter)?;
        self.run_optional(statement).await
    }

    async fn run_optional(&self, statement: Option<Statement>) -> Result<u64> {
        match statement {
            Some(statement) => self.executor.execute(&statement).await,
            None => Ok(0),
        }
    }

    /// Run any statement, returning the affected row count
    pub async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.executor.execute(statement).await
    }
}
