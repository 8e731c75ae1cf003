//! SQL utilities
//!
//! Dialect rendering, condition building, placeholder expansion and
//! identifier quoting.

pub mod condition;
pub mod ddl;
pub mod dialect;
pub mod placeholder;
pub mod sanitize;

pub use condition::ConditionBuilder;
pub use ddl::DdlGenerator;
pub use dialect::{DialectKind, SqlDialect};
pub use sanitize::{quote_identifier, validate_parameter_name};
