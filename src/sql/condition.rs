//! Condition building for SQL WHERE clauses
//!
//! [`ConditionBuilder`] accumulates SQL text and the parameters it binds.
//! Placeholders are named `p0, p1, …` in the order they are allocated and use
//! the parameter prefix of the builder's dialect.
//!
//! Connectives are appended verbatim; the builder does not check that the
//! resulting text is a well-formed condition.

use std::collections::HashSet;

use serde_json::Value;

use crate::entity::Entity;
use crate::error::Result;
use crate::field::{ConditionOperation, DynamicSource, FieldRegistry, SearchAnnotation, WhenNull};
use crate::params::{Parameters, SqlFragment};
use crate::sql::dialect::{SqlDialect, StandardDialect};

/// Fluent WHERE fragment builder
///
/// Every method consumes and returns the builder; [`build`](Self::build)
/// consumes it for good, so a built fragment can no longer change.
#[derive(Debug)]
pub struct ConditionBuilder {
    dialect: &'static dyn SqlDialect,
    sql: String,
    params: Parameters,
    /// Names bound by other fragments of the same statement
    reserved: HashSet<String>,
    next_param: usize,
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConditionBuilder {
    pub fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Parameters::new(),
            reserved: HashSet::new(),
            next_param: 0,
        }
    }

    /// Never allocate a name already bound in `params`
    ///
    /// Use this when the fragment will share a statement with another one,
    /// e.g. a WHERE condition built after the join expression it filters.
    pub fn reserve(mut self, params: &Parameters) -> Self {
        self.reserved.extend(params.names().map(str::to_string));
        self
    }

    /// Builder for the standard dialect (`@` placeholders)
    pub fn standard() -> Self {
        Self::new(&StandardDialect)
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Freeze the builder into its SQL text and parameters
    pub fn build(self) -> SqlFragment {
        SqlFragment::new(self.sql, self.params)
    }

    /// Allocate the next unused parameter name
    pub fn next_parameter_name(&mut self) -> String {
        loop {
            let name = format!("p{}", self.next_param);
            self.next_param += 1;
            if !self.params.contains(&name) && !self.reserved.contains(&name) {
                return name;
            }
        }
    }

    /// Field reference qualified by a table alias
    pub fn format_field(&self, alias: &str, field: &str) -> String {
        self.dialect.format_field(alias, field)
    }

    fn bind(&mut self, value: Value) -> String {
        let name = self.next_parameter_name();
        let placeholder = self.dialect.placeholder(&name);
        self.params.insert(name, value);
        placeholder
    }

    // ========================================================================
    // Comparisons
    // ========================================================================

    /// `<field><operator><placeholder>` with `value` bound to a fresh parameter
    pub fn expression(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let placeholder = self.bind(value.into());
        self.sql.push_str(&format!("{}{}{}", field, operator, placeholder));
        self
    }

    /// Like [`expression`](Self::expression), with the field qualified by `E`'s alias
    pub fn expression_entity<E: Entity>(self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let field = self.format_field(E::table_alias(), field);
        self.expression(&field, operator, value)
    }

    /// Field-to-field comparison; no parameter is bound
    pub fn compare_fields(mut self, field1: &str, operator: &str, field2: &str) -> Self {
        self.sql.push_str(&format!("{}{}{}", field1, operator, field2));
        self
    }

    /// Compare a field of `A` with a field of `B`, both qualified by their aliases
    pub fn compare_entity_fields<A: Entity, B: Entity>(
        self,
        field1: &str,
        operator: &str,
        field2: &str,
    ) -> Self {
        let left = self.format_field(A::table_alias(), field1);
        let right = self.format_field(B::table_alias(), field2);
        self.compare_fields(&left, operator, &right)
    }

    /// `<field> like <p>` with the value wrapped in `%…%`
    pub fn like(self, field: &str, value: impl Into<Value>) -> Self {
        self.like_with(field, value, "%", "%")
    }

    /// `<field> like <p>` with the value wrapped in the given wildcards
    pub fn like_with(mut self, field: &str, value: impl Into<Value>, left: &str, right: &str) -> Self {
        let pattern = format!("{}{}{}", left, json_value_to_string(&value.into()), right);
        let placeholder = self.bind(Value::String(pattern));
        self.sql.push_str(&format!("{} like {}", field, placeholder));
        self
    }

    pub fn like_entity<E: Entity>(self, field: &str, value: impl Into<Value>) -> Self {
        let field = self.format_field(E::table_alias(), field);
        self.like(&field, value)
    }

    pub fn not_like(self, field: &str, value: impl Into<Value>) -> Self {
        self.not_like_with(field, value, "%", "%")
    }

    pub fn not_like_with(mut self, field: &str, value: impl Into<Value>, left: &str, right: &str) -> Self {
        let pattern = format!("{}{}{}", left, json_value_to_string(&value.into()), right);
        let placeholder = self.bind(Value::String(pattern));
        self.sql.push_str(&format!("{} not like {}", field, placeholder));
        self
    }

    pub fn not_like_entity<E: Entity>(self, field: &str, value: impl Into<Value>) -> Self {
        let field = self.format_field(E::table_alias(), field);
        self.not_like(&field, value)
    }

    /// `<field> in (<p>)` with the whole collection bound to one parameter
    pub fn in_list(mut self, field: &str, values: impl Into<Value>) -> Self {
        let placeholder = self.bind(values.into());
        self.sql.push_str(&format!("{} in ({})", field, placeholder));
        self
    }

    pub fn in_list_entity<E: Entity>(self, field: &str, values: impl Into<Value>) -> Self {
        let field = self.format_field(E::table_alias(), field);
        self.in_list(&field, values)
    }

    /// `<field> not in (<p>)`
    pub fn not_in(mut self, field: &str, values: impl Into<Value>) -> Self {
        let placeholder = self.bind(values.into());
        self.sql.push_str(&format!("{} not in ({})", field, placeholder));
        self
    }

    pub fn not_in_entity<E: Entity>(self, field: &str, values: impl Into<Value>) -> Self {
        let field = self.format_field(E::table_alias(), field);
        self.not_in(&field, values)
    }

    // ========================================================================
    // Connectives
    // ========================================================================

    pub fn and(mut self) -> Self {
        self.sql.push_str(" and ");
        self
    }

    pub fn or(mut self) -> Self {
        self.sql.push_str(" or ");
        self
    }

    pub fn paren_open(mut self) -> Self {
        self.sql.push_str(" (");
        self
    }

    pub fn paren_close(mut self) -> Self {
        self.sql.push_str(") ");
        self
    }

    /// Splice in caller supplied SQL along with the parameters it references
    ///
    /// Fails when one of `params` is already bound to a different value.
    pub fn append(mut self, sql: &str, params: Parameters) -> Result<Self> {
        self.params.merge(params)?;
        self.sql.push_str(sql);
        Ok(self)
    }

    // ========================================================================
    // Factories
    // ========================================================================

    /// Build a condition from an annotated search object
    ///
    /// Fields whose value is null or an empty string are skipped unless their
    /// annotation asks for them to be included. Remaining fields are joined
    /// with `and`.
    pub fn from_search<E: Entity>(
        dialect: &'static dyn SqlDialect,
        registry: &FieldRegistry,
        search: &DynamicSource<'_>,
    ) -> Self {
        let mut builder = Self::new(dialect);
        let alias = E::table_alias();
        let mut first = true;

        for annotated in registry.reflect_annotated(search) {
            let annotation = annotated.search.unwrap_or_default();
            let value = annotated.field.value;

            if annotation.when_null == WhenNull::Ignore && is_blank(&value) {
                continue;
            }

            if first {
                first = false;
            } else {
                builder = builder.and();
            }

            let name = annotation
                .name
                .clone()
                .unwrap_or_else(|| annotated.field.name.clone());
            let field = builder.format_field(alias, &name);
            builder = builder.search_condition(&field, &annotation, value);
        }

        builder
    }

    fn search_condition(mut self, field: &str, annotation: &SearchAnnotation, value: Value) -> Self {
        match annotation.operation {
            ConditionOperation::Equal => self.expression(field, "=", value),
            ConditionOperation::NotEqual => self.expression(field, "<>", value),
            ConditionOperation::In => self.in_list(field, value),
            ConditionOperation::NotIn => self.not_in(field, value),
            ConditionOperation::Like => {
                self.like_with(field, value, &annotation.left_chars, &annotation.right_chars)
            }
            ConditionOperation::NotLike => {
                self.not_like_with(field, value, &annotation.left_chars, &annotation.right_chars)
            }
            ConditionOperation::Greater => self.expression(field, ">", value),
            ConditionOperation::GreaterOrEqual => self.expression(field, ">=", value),
            ConditionOperation::Less => self.expression(field, "<", value),
            ConditionOperation::LessOrEqual => self.expression(field, "<=", value),
            ConditionOperation::Custom => match annotation.custom_sql.as_deref() {
                Some(template) if !template.trim().is_empty() => {
                    let name = self.next_parameter_name();
                    let sql = template.replace("@value", &self.dialect.placeholder(&name));
                    self.params.insert(name, value);
                    self.sql.push_str(&sql);
                    self
                }
                _ => self.expression(field, "=", value),
            },
        }
    }

    /// Build an equality condition for every field of a filter object
    ///
    /// Null values are bound as-is.
    pub fn from_dynamic<E: Entity>(
        dialect: &'static dyn SqlDialect,
        registry: &FieldRegistry,
        filter: &DynamicSource<'_>,
    ) -> Self {
        let mut builder = Self::new(dialect);
        let alias = E::table_alias();

        for (i, field) in registry.reflect(filter).into_iter().enumerate() {
            if i > 0 {
                builder = builder.and();
            }
            let column = builder.format_field(alias, &field.name);
            builder = builder.expression(&column, "=", field.value);
        }

        builder
    }
}

/// Null, or a string that is empty
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert JSON value to plain text for LIKE patterns
fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{DynamicFields, FieldDescriptor, to_field_value};
    use crate::sql::dialect::OracleDialect;
    use serde_json::json;

    struct Order;

    impl DynamicFields for Order {
        fn describe(&self) -> Vec<FieldDescriptor> {
            Vec::new()
        }

        fn values(&self) -> Vec<Value> {
            Vec::new()
        }
    }

    impl Entity for Order {
        const TABLE: &'static str = "orders";
    }

    struct Customer;

    impl DynamicFields for Customer {
        fn describe(&self) -> Vec<FieldDescriptor> {
            Vec::new()
        }

        fn values(&self) -> Vec<Value> {
            Vec::new()
        }
    }

    impl Entity for Customer {
        const TABLE: &'static str = "customers";
    }

    #[derive(Default)]
    struct OrderSearch {
        status: Option<String>,
        title: Option<String>,
        min_total: Option<i64>,
        tags: Option<Vec<String>>,
        owner: Option<String>,
    }

    impl DynamicFields for OrderSearch {
        fn describe(&self) -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::new("status"),
                FieldDescriptor::new("title").search(
                    SearchAnnotation::new(ConditionOperation::Like).wrap("", "%"),
                ),
                FieldDescriptor::new("min_total").search(
                    SearchAnnotation::new(ConditionOperation::GreaterOrEqual).column("total"),
                ),
                FieldDescriptor::new("tags").search(SearchAnnotation::new(ConditionOperation::NotIn)),
                FieldDescriptor::new("owner")
                    .search(SearchAnnotation::custom("owner_id in (select id from users where name = @value)")),
            ]
        }

        fn values(&self) -> Vec<Value> {
            vec![
                to_field_value(&self.status),
                to_field_value(&self.title),
                to_field_value(&self.min_total),
                to_field_value(&self.tags),
                to_field_value(&self.owner),
            ]
        }
    }

    fn search(builder_input: &OrderSearch) -> SqlFragment {
        ConditionBuilder::from_search::<Order>(
            &StandardDialect,
            &FieldRegistry::new(),
            &DynamicSource::object(builder_input),
        )
        .build()
    }

    // ==================== Comparison Operations ====================

    #[test]
    fn test_expression_binds_one_parameter() {
        let fragment = ConditionBuilder::standard()
            .expression("\"name\"", "=", "test")
            .build();

        assert_eq!(fragment.sql, "\"name\"=@p0");
        assert_eq!(fragment.params.len(), 1);
        assert_eq!(fragment.params.get("p0"), Some(&json!("test")));
        assert_eq!(fragment.sql.matches('=').count(), 1);
    }

    #[test]
    fn test_expression_entity_qualifies_field() {
        let fragment = ConditionBuilder::standard()
            .expression_entity::<Order>("total", ">", 100)
            .build();

        assert_eq!(fragment.sql, "\"orders\".\"total\">@p0");
    }

    #[test]
    fn test_compare_entity_fields_binds_nothing() {
        let fragment = ConditionBuilder::standard()
            .compare_entity_fields::<Order, Customer>("customer_id", "=", "id")
            .build();

        assert_eq!(fragment.sql, "\"orders\".\"customer_id\"=\"customers\".\"id\"");
        assert!(fragment.params.is_empty());
    }

    #[test]
    fn test_like_wraps_value() {
        let fragment = ConditionBuilder::standard().like("name", "bob").build();

        assert_eq!(fragment.sql, "name like @p0");
        assert_eq!(fragment.params.get("p0"), Some(&json!("%bob%")));
    }

    #[test]
    fn test_like_with_custom_wildcards() {
        let fragment = ConditionBuilder::standard()
            .not_like_with("code", 42, "", "_")
            .build();

        assert_eq!(fragment.sql, "code not like @p0");
        assert_eq!(fragment.params.get("p0"), Some(&json!("42_")));
    }

    #[test]
    fn test_in_and_not_in() {
        let fragment = ConditionBuilder::standard()
            .in_list("a", json!([1, 2]))
            .and()
            .not_in("b", json!(["x"]))
            .build();

        assert_eq!(fragment.sql, "a in (@p0) and b not in (@p1)");
        assert_eq!(fragment.params.get("p0"), Some(&json!([1, 2])));
        assert!(!fragment.sql.contains("not like"));
    }

    // ==================== Logical Operations ====================

    #[test]
    fn test_connectives_and_parens() {
        let fragment = ConditionBuilder::standard()
            .expression("a", "=", 1)
            .and()
            .paren_open()
            .expression("b", "=", 2)
            .or()
            .expression("c", "=", 3)
            .paren_close()
            .build();

        assert_eq!(fragment.sql, "a=@p0 and  (b=@p1 or c=@p2) ");
        assert_eq!(fragment.params.len(), 3);
    }

    #[test]
    fn test_append_splices_parameters() {
        let mut extra = Parameters::new();
        extra.insert("p0", "taken");

        let fragment = ConditionBuilder::standard()
            .append("x = @p0", extra)
            .unwrap()
            .and()
            .expression("y", "=", 1)
            .build();

        // p0 is already bound, so the builder moves on to p1
        assert_eq!(fragment.sql, "x = @p0 and y=@p1");
        assert_eq!(fragment.params.len(), 2);
    }

    #[test]
    fn test_append_rejects_rebinding_existing_name() {
        let mut extra = Parameters::new();
        extra.insert("p0", "other");

        let result = ConditionBuilder::standard()
            .expression("a", "=", 1)
            .and()
            .append("b = @p0", extra);

        assert!(matches!(result, Err(crate::error::DynamicSqlError::Build(_))));
    }

    #[test]
    fn test_reserve_skips_names_of_other_fragment() {
        let join = ConditionBuilder::standard().expression("t.lang", "=", "en").build();

        let filter = ConditionBuilder::standard()
            .reserve(&join.params)
            .expression("a.views", ">", 100)
            .build();

        assert_eq!(filter.sql, "a.views>@p1");
        assert!(!filter.params.contains("p0"));
    }

    #[test]
    fn test_oracle_prefix() {
        let fragment = ConditionBuilder::new(&OracleDialect)
            .expression("a", "=", 1)
            .build();

        assert_eq!(fragment.sql, "a=:p0");
    }

    // ==================== from_search ====================

    #[test]
    fn test_from_search_skips_null_fields() {
        let fragment = search(&OrderSearch {
            status: Some("open".to_string()),
            ..Default::default()
        });

        assert_eq!(fragment.sql, "\"orders\".\"status\"=@p0");
        assert_eq!(fragment.params.len(), 1);
        assert!(!fragment.sql.contains("title"));
    }

    #[test]
    fn test_from_search_skips_empty_strings() {
        let fragment = search(&OrderSearch {
            status: Some(String::new()),
            ..Default::default()
        });

        assert!(fragment.sql.is_empty());
        assert!(fragment.params.is_empty());
    }

    #[test]
    fn test_from_search_joins_with_single_and() {
        let fragment = search(&OrderSearch {
            status: Some("open".to_string()),
            min_total: Some(10),
            ..Default::default()
        });

        assert_eq!(
            fragment.sql,
            "\"orders\".\"status\"=@p0 and \"orders\".\"total\">=@p1"
        );
        assert_eq!(fragment.sql.matches(" and ").count(), 1);
        assert!(!fragment.sql.starts_with(' '));
    }

    #[test]
    fn test_from_search_like_uses_annotation_wildcards() {
        let fragment = search(&OrderSearch {
            title: Some("Spring".to_string()),
            ..Default::default()
        });

        assert_eq!(fragment.sql, "\"orders\".\"title\" like @p0");
        assert_eq!(fragment.params.get("p0"), Some(&json!("Spring%")));
    }

    #[test]
    fn test_from_search_not_in() {
        let fragment = search(&OrderSearch {
            tags: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        });

        assert_eq!(fragment.sql, "\"orders\".\"tags\" not in (@p0)");
        assert_eq!(fragment.params.get("p0"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_from_search_custom_template() {
        let fragment = search(&OrderSearch {
            owner: Some("ann".to_string()),
            ..Default::default()
        });

        assert_eq!(
            fragment.sql,
            "owner_id in (select id from users where name = @p0)"
        );
        assert_eq!(fragment.params.get("p0"), Some(&json!("ann")));
    }

    #[test]
    fn test_from_search_custom_empty_template_falls_back_to_equal() {
        struct Lookup {
            code: String,
        }

        impl DynamicFields for Lookup {
            fn describe(&self) -> Vec<FieldDescriptor> {
                vec![FieldDescriptor::new("code").search(SearchAnnotation::custom(""))]
            }

            fn values(&self) -> Vec<Value> {
                vec![json!(self.code)]
            }
        }

        let lookup = Lookup {
            code: "X1".to_string(),
        };
        let fragment = ConditionBuilder::from_search::<Order>(
            &StandardDialect,
            &FieldRegistry::new(),
            &DynamicSource::object(&lookup),
        )
        .build();

        assert_eq!(fragment.sql, "\"orders\".\"code\"=@p0");
    }

    #[test]
    fn test_from_search_include_null() {
        struct Nullable {
            parent_id: Option<i64>,
        }

        impl DynamicFields for Nullable {
            fn describe(&self) -> Vec<FieldDescriptor> {
                vec![FieldDescriptor::new("parent_id").search(SearchAnnotation::default().include_null())]
            }

            fn values(&self) -> Vec<Value> {
                vec![to_field_value(&self.parent_id)]
            }
        }

        let fragment = ConditionBuilder::from_search::<Order>(
            &StandardDialect,
            &FieldRegistry::new(),
            &DynamicSource::object(&Nullable { parent_id: None }),
        )
        .build();

        assert_eq!(fragment.sql, "\"orders\".\"parent_id\"=@p0");
        assert_eq!(fragment.params.get("p0"), Some(&Value::Null));
    }

    #[test]
    fn test_from_search_map_defaults_to_equal_and_ignore() {
        let filter = json!({ "status": "open", "note": null });
        let fragment = ConditionBuilder::from_search::<Order>(
            &StandardDialect,
            &FieldRegistry::new(),
            &DynamicSource::from(&filter),
        )
        .build();

        assert_eq!(fragment.sql, "\"orders\".\"status\"=@p0");
    }

    // ==================== from_dynamic ====================

    #[test]
    fn test_from_dynamic_binds_nulls() {
        let filter = json!({ "status": "open", "closed_at": null });
        let fragment = ConditionBuilder::from_dynamic::<Order>(
            &StandardDialect,
            &FieldRegistry::new(),
            &DynamicSource::from(&filter),
        )
        .build();

        assert_eq!(
            fragment.sql,
            "\"orders\".\"status\"=@p0 and \"orders\".\"closed_at\"=@p1"
        );
        assert_eq!(fragment.params.get("p1"), Some(&Value::Null));
    }

    #[test]
    fn test_from_dynamic_is_repeatable() {
        let filter = json!({ "a": 1, "b": "two" });
        let registry = FieldRegistry::new();
        let build = || {
            ConditionBuilder::from_dynamic::<Order>(
                &StandardDialect,
                &registry,
                &DynamicSource::from(&filter),
            )
            .build()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_from_dynamic_none_is_empty() {
        let fragment = ConditionBuilder::from_dynamic::<Order>(
            &StandardDialect,
            &FieldRegistry::new(),
            &DynamicSource::None,
        )
        .build();

        assert!(fragment.is_empty());
    }
}
