//! The per-request set of query options and its application order.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::ser::{Error as _, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use crate::errors::{ApplyError, ConfigurationError};
use crate::limits::QueryLimits;
use crate::options::{
    CountOption, FilterOption, OrderByOption, ParseContext, QueryOption, SelectExpandOption,
    SkipOption, TopOption,
};
use crate::projection::Projection;
use crate::query::RawQueryParams;
use crate::record::Entity;
use crate::schema::{ElementType, ElementTypeId, TypeRegistry};
use crate::source::Queryable;
use crate::validation::ValidationSink;

/// One option of each kind, bound to the element type of `T`.
///
/// Created per request, populated by [`initialize`](Self::initialize) and
/// consumed by [`apply_to`](Self::apply_to).
pub struct QueryOptions<T> {
    registry: Arc<TypeRegistry>,
    element_type: ElementTypeId,
    limits: QueryLimits,
    select_expand: SelectExpandOption,
    filter: FilterOption,
    order_by: OrderByOption,
    skip: SkipOption,
    top: TopOption,
    count: CountOption,
    marker: PhantomData<fn() -> T>,
}

impl<T: Entity> QueryOptions<T> {
    /// # Errors
    /// `ConfigurationError::UnknownElementType` when `T::TYPE_NAME` is not
    /// registered.
    pub fn new(registry: Arc<TypeRegistry>) -> Result<Self, ConfigurationError> {
        let element_type = registry
            .element_type_id(T::TYPE_NAME)
            .ok_or_else(|| ConfigurationError::UnknownElementType(T::TYPE_NAME.to_owned()))?;
        Ok(Self {
            registry,
            element_type,
            limits: QueryLimits::default(),
            select_expand: SelectExpandOption::default(),
            filter: FilterOption::default(),
            order_by: OrderByOption::default(),
            skip: SkipOption::default(),
            top: TopOption::default(),
            count: CountOption::default(),
            marker: PhantomData,
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn element_type(&self) -> &ElementType {
        self.registry.get(self.element_type)
    }

    /// Parse every parameter. Errors are recorded in `sink`; a rejected
    /// parameter leaves its option inactive and does not affect the others.
    pub fn initialize(&mut self, params: &RawQueryParams, sink: &mut dyn ValidationSink) {
        let ctx = ParseContext {
            registry: &self.registry,
            element_type: self.registry.get(self.element_type),
            limits: &self.limits,
        };
        self.select_expand.initialize(params, &ctx, sink);
        self.filter.initialize(params, &ctx, sink);
        self.order_by.initialize(params, &ctx, sink);
        self.skip.initialize(params, &ctx, sink);
        self.top.initialize(params, &ctx, sink);
        self.count.initialize(params, &ctx, sink);
    }

    #[must_use]
    pub fn select_expand(&self) -> &SelectExpandOption {
        &self.select_expand
    }

    #[must_use]
    pub fn filter(&self) -> &FilterOption {
        &self.filter
    }

    #[must_use]
    pub fn order_by(&self) -> &OrderByOption {
        &self.order_by
    }

    #[must_use]
    pub fn skip(&self) -> &SkipOption {
        &self.skip
    }

    #[must_use]
    pub fn top(&self) -> &TopOption {
        &self.top
    }

    #[must_use]
    pub fn count(&self) -> &CountOption {
        &self.count
    }

    /// Apply the options to `source`: include, order, filter, count, skip,
    /// top, materialize.
    ///
    /// # Errors
    /// `ApplyError::Cancelled` when `cancel` fires while counting or
    /// materializing; `ApplyError::Source` when the source fails.
    #[tracing::instrument(level = "debug", skip_all, fields(element_type = T::TYPE_NAME))]
    pub async fn apply_to<Q>(
        &self,
        source: Q,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult<T>, ApplyError>
    where
        Q: Queryable<T>,
    {
        let source = step(&self.select_expand, source);
        let source = step(&self.order_by, source);
        let source = step(&self.filter, source);

        let total_count = if self.count.is_requested() {
            let n = run_cancellable(cancel, source.count()).await?;
            tracing::trace!(total_count = n, "counted matches");
            Some(n)
        } else {
            None
        };

        let source = step(&self.skip, source);
        let source = step(&self.top, source);
        let items = run_cancellable(cancel, source.materialize()).await?;
        tracing::trace!(items = items.len(), "materialized");

        Ok(ApplyResult {
            items,
            total_count,
            projection: self.select_expand.projection().clone(),
        })
    }
}

fn step<T, O: QueryOption, Q: Queryable<T>>(option: &O, source: Q) -> Q {
    if !option.is_active() {
        return source;
    }
    tracing::trace!(option = %O::PARAMETERS.join(","), "applying query option");
    option.apply(source)
}

async fn run_cancellable<V, E>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<V, E>>,
) -> Result<V, ApplyError>
where
    E: std::error::Error + Send + Sync + 'static,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::warn!("query apply cancelled");
            Err(ApplyError::Cancelled)
        }
        result = fut => result.map_err(|e| ApplyError::Source(Box::new(e))),
    }
}

/// Items left after every option, plus the count taken before paging.
///
/// Serializes to `{"totalCount": ..., "resultItems": [...]}` with the
/// `$select`/`$expand` projection applied to each item.
#[derive(Debug, Clone)]
pub struct ApplyResult<T> {
    pub items: Vec<T>,
    pub total_count: Option<u64>,
    projection: Projection,
}

impl<T> ApplyResult<T> {
    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: Serialize> Serialize for ApplyResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApplyResult", 2)?;
        state.serialize_field("totalCount", &self.total_count)?;
        state.serialize_field(
            "resultItems",
            &ProjectedItems {
                items: &self.items,
                projection: &self.projection,
            },
        )?;
        state.end()
    }
}

struct ProjectedItems<'a, T> {
    items: &'a [T],
    projection: &'a Projection,
}

impl<T: Serialize> Serialize for ProjectedItems<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in self.items {
            let value = serde_json::to_value(item).map_err(S::Error::custom)?;
            seq.serialize_element(&self.projection.project(&value))?;
        }
        seq.end()
    }
}
