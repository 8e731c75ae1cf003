//! Dynamic field reflection
//!
//! Turns arbitrary input objects into an ordered list of `(name, value, is_key)`
//! triples. Named types describe themselves through [`DynamicFields`]; their
//! descriptors are cached per type in a [`FieldRegistry`] while values are read
//! fresh on every call. Maps, parameter bags and serialized values are read
//! directly without caching.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Map;
pub use serde_json::Value;

use crate::error::Result;
use crate::params::Parameters;

/// A single reflected field
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicField {
    pub name: String,
    pub value: Value,
    pub is_key: bool,
}

impl DynamicField {
    pub fn new(name: impl Into<String>, value: Value, is_key: bool) -> Self {
        Self {
            name: name.into(),
            value,
            is_key,
        }
    }
}

// ============================================================================
// Search annotations
// ============================================================================

/// Comparison emitted for a search field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionOperation {
    #[default]
    Equal,
    NotEqual,
    In,
    NotIn,
    Like,
    NotLike,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Custom,
}

impl ConditionOperation {
    /// Parse an operation name; anything unrecognised is treated as `Equal`
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "notequal" | "not_equal" | "ne" => Self::NotEqual,
            "in" => Self::In,
            "notin" | "not_in" => Self::NotIn,
            "like" => Self::Like,
            "notlike" | "not_like" => Self::NotLike,
            "greater" | "gt" => Self::Greater,
            "greaterorequal" | "greater_or_equal" | "gte" => Self::GreaterOrEqual,
            "less" | "lt" => Self::Less,
            "lessorequal" | "less_or_equal" | "lte" => Self::LessOrEqual,
            "custom" => Self::Custom,
            _ => Self::Equal,
        }
    }
}

/// What to do with a search field whose value is null or an empty string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhenNull {
    #[default]
    Ignore,
    Include,
}

/// Per-field metadata that drives WHERE generation from a search object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchAnnotation {
    pub operation: ConditionOperation,
    pub when_null: WhenNull,
    /// Column name to use instead of the field name
    pub name: Option<String>,
    pub left_chars: String,
    pub right_chars: String,
    /// Template for `Custom`; the token `@value` is replaced by a bound placeholder
    pub custom_sql: Option<String>,
}

impl Default for SearchAnnotation {
    fn default() -> Self {
        Self::new(ConditionOperation::Equal)
    }
}

impl SearchAnnotation {
    pub fn new(operation: ConditionOperation) -> Self {
        Self {
            operation,
            when_null: WhenNull::Ignore,
            name: None,
            left_chars: "%".to_string(),
            right_chars: "%".to_string(),
            custom_sql: None,
        }
    }

    /// `Custom` annotation with the given SQL template
    pub fn custom(sql: impl Into<String>) -> Self {
        Self {
            custom_sql: Some(sql.into()),
            ..Self::new(ConditionOperation::Custom)
        }
    }

    pub fn include_null(mut self) -> Self {
        self.when_null = WhenNull::Include;
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the LIKE wildcards placed around the value
    pub fn wrap(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_chars = left.into();
        self.right_chars = right.into();
        self
    }
}

// ============================================================================
// Field descriptors
// ============================================================================

/// Static description of one field of a named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub is_key: bool,
    pub search: Option<SearchAnnotation>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_key: false,
            search: None,
        }
    }

    /// Mark the field as (part of) the primary key
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn search(mut self, annotation: SearchAnnotation) -> Self {
        self.search = Some(annotation);
        self
    }
}

/// Capability implemented by every entity, filter or search type
///
/// `describe` and `values` must list the same fields in the same order. Fields
/// that are not mapped to columns are left out of both.
pub trait DynamicFields: Send + Sync + 'static {
    fn describe(&self) -> Vec<FieldDescriptor>;

    fn values(&self) -> Vec<Value>;

    /// Cache key for this type's descriptors
    fn type_key(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[doc(hidden)]
pub fn to_field_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "field value could not be serialized, binding NULL");
        Value::Null
    })
}

#[doc(hidden)]
pub fn describe_with(
    descriptor: FieldDescriptor,
    f: impl FnOnce(FieldDescriptor) -> FieldDescriptor,
) -> FieldDescriptor {
    f(descriptor)
}

/// Implement [`DynamicFields`] for a struct by listing its mapped fields
///
/// Each field may be followed by `=> |d| ...` to adjust its descriptor.
///
/// ```
/// use dynamic_sql::dynamic_fields;
/// use dynamic_sql::field::{ConditionOperation, SearchAnnotation};
///
/// #[derive(serde::Serialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// dynamic_fields!(User {
///     id => |d| d.key(),
///     name => |d| d.search(SearchAnnotation::new(ConditionOperation::Like)),
/// });
/// ```
#[macro_export]
macro_rules! dynamic_fields {
    ($ty:ty { $($field:ident $(=> $desc:expr)?),* $(,)? }) => {
        impl $crate::field::DynamicFields for $ty {
            fn describe(&self) -> ::std::vec::Vec<$crate::field::FieldDescriptor> {
                ::std::vec![$($crate::dynamic_fields!(@desc $field $(, $desc)?)),*]
            }

            fn values(&self) -> ::std::vec::Vec<$crate::field::Value> {
                ::std::vec![$($crate::field::to_field_value(&self.$field)),*]
            }
        }
    };
    (@desc $field:ident) => {
        $crate::field::FieldDescriptor::new(stringify!($field))
    };
    (@desc $field:ident, $desc:expr) => {
        $crate::field::describe_with(
            $crate::field::FieldDescriptor::new(stringify!($field)),
            $desc,
        )
    };
}

// ============================================================================
// Sources
// ============================================================================

/// Any object that can be reflected into dynamic fields
#[derive(Clone, Copy)]
pub enum DynamicSource<'a> {
    None,
    /// A pre-built parameter bag; keys are not tracked
    Params(&'a Parameters),
    /// An ordered name → value mapping
    Map(&'a Map<String, Value>),
    /// A serialized inline shape (JSON object)
    Value(&'a Value),
    /// A named type that describes itself
    Object(&'a dyn DynamicFields),
}

impl<'a> DynamicSource<'a> {
    pub fn object<T: DynamicFields>(obj: &'a T) -> Self {
        Self::Object(obj)
    }

    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::Value(v) => v.is_null(),
            _ => false,
        }
    }
}

impl std::fmt::Debug for DynamicSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Params(p) => f.debug_tuple("Params").field(p).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Object(o) => f.debug_tuple("Object").field(&o.type_key()).finish(),
        }
    }
}

impl<'a> From<&'a Parameters> for DynamicSource<'a> {
    fn from(params: &'a Parameters) -> Self {
        Self::Params(params)
    }
}

impl<'a> From<&'a Map<String, Value>> for DynamicSource<'a> {
    fn from(map: &'a Map<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl<'a> From<&'a Value> for DynamicSource<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

/// Serialize an inline shape so it can be used as a [`DynamicSource::Value`]
pub fn shape_of<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

// ============================================================================
// Registry
// ============================================================================

/// Reflected field together with its search annotation, if any
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedField {
    pub field: DynamicField,
    pub search: Option<SearchAnnotation>,
}

/// Append-only cache of type descriptors
///
/// Safe for concurrent use; descriptors are inserted once per type and never
/// invalidated.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    shapes: RwLock<HashMap<&'static str, Arc<[FieldDescriptor]>>>,
}

static GLOBAL_REGISTRY: LazyLock<FieldRegistry> = LazyLock::new(FieldRegistry::new);

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for callers that do not manage their own
    pub fn global() -> &'static FieldRegistry {
        &GLOBAL_REGISTRY
    }

    /// Number of cached type shapes
    pub fn cached_shapes(&self) -> usize {
        self.shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cached descriptors for the object's type, describing it on first use
    pub fn shape(&self, obj: &dyn DynamicFields) -> Arc<[FieldDescriptor]> {
        let key = obj.type_key();
        if let Some(shape) = self
            .shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(shape);
        }

        let described: Arc<[FieldDescriptor]> = obj.describe().into();
        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(shapes.entry(key).or_insert(described))
    }

    /// Reflect a source into ordered dynamic fields
    pub fn reflect(&self, source: &DynamicSource<'_>) -> Vec<DynamicField> {
        self.reflect_annotated(source)
            .into_iter()
            .map(|a| a.field)
            .collect()
    }

    /// Field names only, in order
    pub fn field_names(&self, source: &DynamicSource<'_>) -> Vec<String> {
        self.reflect(source).into_iter().map(|f| f.name).collect()
    }

    /// Reflect a source, keeping the search annotation of each field
    pub fn reflect_annotated(&self, source: &DynamicSource<'_>) -> Vec<AnnotatedField> {
        match source {
            DynamicSource::None => Vec::new(),
            DynamicSource::Params(params) => params
                .iter()
                .map(|(name, value)| plain(name, value))
                .collect(),
            DynamicSource::Map(map) => map.iter().map(|(name, value)| plain(name, value)).collect(),
            DynamicSource::Value(value) => match value {
                Value::Object(map) => map.iter().map(|(name, value)| plain(name, value)).collect(),
                _ => Vec::new(),
            },
            DynamicSource::Object(obj) => {
                let shape = self.shape(*obj);
                let values = obj.values();
                if values.len() != shape.len() {
                    tracing::warn!(
                        type_name = obj.type_key(),
                        described = shape.len(),
                        values = values.len(),
                        "descriptor and value counts differ"
                    );
                }
                shape
                    .iter()
                    .zip(values)
                    .map(|(desc, value)| AnnotatedField {
                        field: DynamicField::new(desc.name.clone(), value, desc.is_key),
                        search: desc.search.clone(),
                    })
                    .collect()
            }
        }
    }
}

fn plain(name: &str, value: &Value) -> AnnotatedField {
    AnnotatedField {
        field: DynamicField::new(name, value.clone(), false),
        search: None,
    }
}
