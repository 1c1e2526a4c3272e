use crate::ast::Expr;
use crate::errors::QueryError;
use crate::parser::parse_filter;
use crate::query::RawQueryParams;
use crate::source::Queryable;
use crate::validation::ValidationSink;

use super::{ParseContext, QueryOption, reject};

/// `$filter`: keep the items for which the predicate is definitely true.
#[derive(Debug, Clone, Default)]
pub struct FilterOption {
    expr: Option<Expr>,
}

impl FilterOption {
    pub const PARAMETER: &'static str = "$filter";

    #[must_use]
    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<Expr, QueryError> {
        ctx.limits.validate_filter_length(raw)?;
        let expr = parse_filter(raw, ctx.registry, ctx.element_type)?;
        ctx.limits.validate_filter_nodes(expr.node_count())?;
        Ok(expr)
    }
}

impl QueryOption for FilterOption {
    const PARAMETERS: &'static [&'static str] = &[Self::PARAMETER];

    fn initialize(
        &mut self,
        params: &RawQueryParams,
        ctx: &ParseContext<'_>,
        sink: &mut dyn ValidationSink,
    ) {
        self.expr = None;
        let Some(raw) = params.get(Self::PARAMETER) else {
            return;
        };
        match Self::parse(raw, ctx) {
            Ok(expr) => {
                tracing::debug!(filter = %expr, "parsed $filter");
                self.expr = Some(expr);
            }
            Err(e) => reject(sink, Self::PARAMETER, e),
        }
    }

    fn is_active(&self) -> bool {
        self.expr.is_some()
    }

    fn apply<T, Q: Queryable<T>>(&self, source: Q) -> Q {
        match &self.expr {
            Some(expr) => source.filter(expr),
            None => source,
        }
    }
}
