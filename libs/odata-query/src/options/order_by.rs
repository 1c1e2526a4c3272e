use std::fmt;

use crate::ast::OrderKey;
use crate::errors::QueryError;
use crate::parser::parse_orderby;
use crate::query::RawQueryParams;
use crate::source::Queryable;
use crate::validation::ValidationSink;

use super::{ParseContext, QueryOption, reject};

/// `$orderby`: stable multi-key sort over scalar leaves.
#[derive(Debug, Clone, Default)]
pub struct OrderByOption {
    keys: Vec<OrderKey>,
}

impl OrderByOption {
    pub const PARAMETER: &'static str = "$orderby";

    #[must_use]
    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<Vec<OrderKey>, QueryError> {
        let keys = parse_orderby(raw, ctx.registry, ctx.element_type)?;
        ctx.limits.validate_orderby_count(keys.len())?;
        Ok(keys)
    }
}

/// Renders as `name asc, age desc`.
impl fmt::Display for OrderByOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl QueryOption for OrderByOption {
    const PARAMETERS: &'static [&'static str] = &[Self::PARAMETER];

    fn initialize(
        &mut self,
        params: &RawQueryParams,
        ctx: &ParseContext<'_>,
        sink: &mut dyn ValidationSink,
    ) {
        self.keys.clear();
        let Some(raw) = params.get(Self::PARAMETER) else {
            return;
        };
        match Self::parse(raw, ctx) {
            Ok(keys) => self.keys = keys,
            Err(e) => reject(sink, Self::PARAMETER, e),
        }
    }

    fn is_active(&self) -> bool {
        !self.keys.is_empty()
    }

    fn apply<T, Q: Queryable<T>>(&self, source: Q) -> Q {
        if self.keys.is_empty() {
            source
        } else {
            source.order_by(&self.keys)
        }
    }
}
