//! One option type per supported query parameter.
//!
//! Every option follows the same lifecycle: `initialize` reads its raw
//! parameter, records errors in the sink and becomes active only on success;
//! `apply` adds the option's step to a [`Queryable`] (identity while inactive).

mod count;
mod filter;
mod order_by;
mod paging;
mod select_expand;

pub use count::CountOption;
pub use filter::FilterOption;
pub use order_by::OrderByOption;
pub use paging::{SkipOption, TopOption};
pub use select_expand::{ExpandItem, Selection, SelectExpandOption};

use crate::errors::QueryError;
use crate::limits::QueryLimits;
use crate::query::RawQueryParams;
use crate::schema::{ElementType, TypeRegistry};
use crate::source::Queryable;
use crate::validation::ValidationSink;

/// What an option needs to resolve names while initializing.
#[derive(Clone, Copy, Debug)]
pub struct ParseContext<'a> {
    pub registry: &'a TypeRegistry,
    pub element_type: &'a ElementType,
    pub limits: &'a QueryLimits,
}

pub trait QueryOption {
    /// Query parameters this option reads.
    const PARAMETERS: &'static [&'static str];

    /// Parse and validate; errors go to `sink`, never out of this call.
    fn initialize(
        &mut self,
        params: &RawQueryParams,
        ctx: &ParseContext<'_>,
        sink: &mut dyn ValidationSink,
    );

    /// Whether the parameter was present and parsed successfully.
    fn is_active(&self) -> bool;

    #[must_use]
    fn apply<T, Q: Queryable<T>>(&self, source: Q) -> Q {
        source
    }
}

pub(crate) fn reject(sink: &mut dyn ValidationSink, parameter: &str, error: QueryError) {
    tracing::debug!(parameter, error = %error, "query parameter rejected");
    sink.add_error(parameter, error);
}
