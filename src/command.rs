//! INSERT, UPDATE, DELETE and restore statements for entity tables
//!
//! Entities with a [`LogicalDelete`](crate::entity::LogicalDelete) descriptor
//! never lose rows: delete flips the flag column to its deleted value and
//! restore flips it back. The flag is bound last, as `ld_<flag column>`.

use crate::entity::Entity;
use crate::error::{DynamicSqlError, Result};
use crate::field::{DynamicField, DynamicSource, FieldRegistry};
use crate::params::{Parameters, Statement};
use crate::query::Where;
use crate::sql::dialect::SqlDialect;
use crate::sql::sanitize::validate_parameter_name;

/// Prefix of the parameters that carry UPDATE's WHERE values
pub const WHERE_PREFIX: &str = "w_";

/// Builds data-changing statements for entity tables
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    dialect: &'static dyn SqlDialect,
    registry: &'a FieldRegistry,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(dialect: &'static dyn SqlDialect, registry: &'a FieldRegistry) -> Self {
        Self { dialect, registry }
    }

    fn table<E: Entity>(&self) -> String {
        self.dialect.format_table_name(&E::table_name())
    }

    fn reflect(&self, source: &DynamicSource<'_>) -> Result<Vec<DynamicField>> {
        let fields = self.registry.reflect(source);
        for field in &fields {
            validate_parameter_name(&field.name)?;
        }
        Ok(fields)
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// `INSERT` of every mapped field of `entity`
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<Statement> {
        let fields = self.reflect(&DynamicSource::object(entity))?;
        if fields.is_empty() {
            return Err(DynamicSqlError::empty_input(format!(
                "{} has no mapped fields to insert",
                E::TABLE
            )));
        }

        let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let sql = self.dialect.format_insert_sql(&self.table::<E>(), &names);
        Ok(Statement::new(sql, Parameters::from_fields(&fields, "")))
    }

    /// One `INSERT` per entity, all sharing the same SQL text
    pub fn insert_many<E: Entity>(&self, entities: &[E]) -> Result<Vec<Statement>> {
        if entities.is_empty() {
            return Err(DynamicSqlError::empty_input(format!(
                "no rows given to insert into {}",
                E::TABLE
            )));
        }
        entities.iter().map(|e| self.insert(e)).collect()
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// `UPDATE` setting every field of `data`
    ///
    /// With a filter, its fields (or fragment) form the WHERE clause. Without
    /// one, `data` must be an `E` value and its key fields become the WHERE
    /// clause; they are then left out of the SET list. `Ok(None)` means there
    /// is nothing to run. A statement without a WHERE clause is never built.
    pub fn update<E: Entity>(
        &self,
        data: &DynamicSource<'_>,
        filter: &Where<'_>,
    ) -> Result<Option<Statement>> {
        if data.is_none() {
            return Ok(None);
        }

        let fields = self.reflect(data)?;
        let table = self.table::<E>();

        if filter.is_none() {
            return self.update_by_key::<E>(data, fields, &table);
        }

        match filter {
            Where::Fields(source) => {
                let where_fields = self.reflect(source)?;
                if fields.is_empty() || where_fields.is_empty() {
                    return Ok(None);
                }
                let set_names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
                let where_names: Vec<String> = where_fields.iter().map(|f| f.name.clone()).collect();

                let mut params = Parameters::from_fields(&fields, "");
                params.merge(Parameters::from_fields(&where_fields, WHERE_PREFIX))?;

                let sql = self
                    .dialect
                    .format_update_sql(&table, &set_names, &where_names, WHERE_PREFIX);
                Ok(Some(Statement::new(sql, params)))
            }
            // fragment or raw text
            _ => {
                let (where_sql, where_params) = filter.render(self.dialect, self.registry)?;
                if fields.is_empty() || where_sql.is_empty() {
                    return Ok(None);
                }
                let set_names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();

                let mut params = Parameters::from_fields(&fields, "");
                params.merge(where_params)?;

                let mut sql = self
                    .dialect
                    .format_update_sql(&table, &set_names, &[], WHERE_PREFIX);
                sql.push_str(&where_sql);
                Ok(Some(Statement::new(sql, params)))
            }
        }
    }

    fn update_by_key<E: Entity>(
        &self,
        data: &DynamicSource<'_>,
        fields: Vec<DynamicField>,
        table: &str,
    ) -> Result<Option<Statement>> {
        let is_entity = matches!(
            data,
            DynamicSource::Object(obj) if obj.type_key() == std::any::type_name::<E>()
        );
        if !is_entity {
            tracing::debug!(table = E::TABLE, "update without filter needs an entity value, skipping");
            return Ok(None);
        }

        let (keys, values): (Vec<DynamicField>, Vec<DynamicField>) =
            fields.into_iter().partition(|f| f.is_key);
        if keys.is_empty() || values.is_empty() {
            tracing::warn!(
                table = E::TABLE,
                keys = keys.len(),
                values = values.len(),
                "update by key has nothing to match or nothing to set, skipping"
            );
            return Ok(None);
        }

        let set_names: Vec<String> = values.iter().map(|f| f.name.clone()).collect();
        let key_names: Vec<String> = keys.iter().map(|f| f.name.clone()).collect();

        let mut params = Parameters::from_fields(&values, "");
        params.merge(Parameters::from_fields(&keys, WHERE_PREFIX))?;

        let sql = self
            .dialect
            .format_update_sql(table, &set_names, &key_names, WHERE_PREFIX);
        Ok(Some(Statement::new(sql, params)))
    }

    /// Update an entity by its key fields
    pub fn update_entity<E: Entity>(&self, entity: &E) -> Result<Option<Statement>> {
        self.update::<E>(&DynamicSource::object(entity), &Where::None)
    }

    // =========================================================================
    // Delete / Restore
    // =========================================================================

    /// Physical `DELETE`, or a flag update for logically deleted entities
    pub fn delete<E: Entity>(&self, filter: &Where<'_>) -> Result<Option<Statement>> {
        if filter.is_none() {
            return Ok(None);
        }

        let table = self.table::<E>();
        let (where_sql, mut params) = filter.render(self.dialect, self.registry)?;
        if where_sql.is_empty() {
            return Ok(None);
        }

        let sql = match E::logical_delete() {
            Some(ld) => {
                let param = ld.param_name();
                let sql = self.dialect.format_logical_delete_restore_sql(
                    &table,
                    &ld.field,
                    &param,
                    &where_sql,
                );
                params.insert(param, ld.deleted_value);
                sql
            }
            None => self.dialect.format_delete_sql(&table, &where_sql),
        };

        Ok(Some(Statement::new(sql, params)))
    }

    /// Reset the logical delete flag to its normal value
    pub fn restore<E: Entity>(&self, filter: &Where<'_>) -> Result<Option<Statement>> {
        if filter.is_none() {
            return Ok(None);
        }

        let ld = E::logical_delete().ok_or_else(|| {
            DynamicSqlError::unsupported(format!(
                "{} does not support logical restore",
                E::TABLE
            ))
        })?;

        let table = self.table::<E>();
        let (where_sql, mut params) = filter.render(self.dialect, self.registry)?;
        if where_sql.is_empty() {
            return Ok(None);
        }
        let param = ld.param_name();
        let sql = self
            .dialect
            .format_logical_delete_restore_sql(&table, &ld.field, &param, &where_sql);
        params.insert(param, ld.normal_value);

        Ok(Some(Statement::new(sql, params)))
    }
}
