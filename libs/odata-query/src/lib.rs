#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `OData` query options (`$select`, `$expand`, `$filter`, `$orderby`, `$skip`,
//! `$top`, `$count`) compiled against typed element metadata and applied to
//! an abstract [`Queryable`] source.
//!
//! ```rust,ignore
//! let mut options = QueryOptions::<Person>::new(registry.clone())?;
//! let mut errors = ValidationErrors::new();
//! options.initialize(&RawQueryParams::from_query_string(query)?, &mut errors);
//! if !errors.is_empty() {
//!     return Err(errors.to_problem(path));
//! }
//! let result = options.apply_to(MemoryQueryable::new(people), &cancel).await?;
//! let body = serde_json::to_value(&result)?;
//! ```

pub mod ast;
pub mod docs;
pub mod errors;
mod eval;
pub mod lexer;
pub mod limits;
pub mod options;
pub mod parser;
pub mod problem;
pub mod projection;
pub mod query;
pub mod record;
pub mod schema;
pub mod set;
pub mod source;
pub mod validation;
pub mod value;

pub use ast::{ArithmeticOperator, CompareOperator, Expr, ExprNode, Function, OrderKey, SortDir};
pub use docs::{ParameterDoc, ParameterType, QUERY_PARAMETERS};
pub use errors::{ApplyError, ConfigurationError, QueryError};
pub use limits::QueryLimits;
pub use options::{
    CountOption, ExpandItem, FilterOption, OrderByOption, ParseContext, QueryOption, Selection,
    SelectExpandOption, SkipOption, TopOption,
};
pub use parser::{parse_filter, parse_orderby};
pub use problem::{ParameterViolation, Problem};
pub use projection::Projection;
pub use query::RawQueryParams;
pub use record::{Entity, FieldValue, Record};
pub use schema::{
    Cardinality, ElementType, ElementTypeBuilder, ElementTypeId, FieldDescriptor, FieldShape,
    PropertyPath, TypeRegistry, TypeRegistryBuilder,
};
pub use set::{ApplyResult, QueryOptions};
pub use source::{MemoryQueryable, Queryable};
pub use validation::{ValidationErrors, ValidationSink};
pub use value::{FieldKind, IntoValue, Value, ValueKind};
