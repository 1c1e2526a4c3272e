mod common;

use common::{Person, names, options, people, person};
use odata_query::{
    ApplyError, ConfigurationError, CountOption, Expr, FilterOption, MemoryQueryable, OrderKey,
    OrderByOption, ParseContext, QueryError, QueryLimits, QueryOption, QueryOptions, Queryable,
    RawQueryParams, SelectExpandOption, SkipOption, TopOption, TypeRegistry, ValidationErrors,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn run(query: &str, items: Vec<common::Person>) -> (Vec<common::Person>, Option<u64>) {
    let (options, errors) = options(query);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let result = options
        .apply_to(MemoryQueryable::new(items), &CancellationToken::new())
        .await
        .unwrap();
    (result.items, result.total_count)
}

#[tokio::test]
async fn test_filter_orderby_top() {
    let (items, count) = run(
        "$filter=age gt 30 and department eq 'Eng'&$orderby=name&$top=2",
        people(),
    )
    .await;
    assert_eq!(names(&items), ["Ann", "Cid"]);
    assert_eq!(count, None);
}

#[tokio::test]
async fn test_skip_and_top_select_middle_item() {
    let (items, _) = run("$skip=1&$top=1", people()).await;
    assert_eq!(names(&items), ["Bo"]);
}

#[tokio::test]
async fn test_count_with_no_matches() {
    let (items, count) = run("$filter=age gt 1000&$count=true", people()).await;
    assert!(items.is_empty());
    assert_eq!(count, Some(0));
}

#[tokio::test]
async fn test_count_ignores_paging() {
    let (items, count) = run("$filter=age ge 30&$count=TRUE&$skip=1&$top=5", people()).await;
    assert_eq!(names(&items), ["Cid"]);
    assert_eq!(count, Some(2));
}

#[tokio::test]
async fn test_count_false_is_accepted() {
    let (items, count) = run("$count=False", people()).await;
    assert_eq!(items.len(), 3);
    assert_eq!(count, None);
}

#[tokio::test]
async fn test_unknown_filter_field_returns_full_set() {
    let (options, errors) = options("$filter=unknownField eq 1&$orderby=age desc");
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.for_parameter("$filter").next(),
        Some(QueryError::UnknownProperty { name, .. }) if name == "unknownField"
    ));
    assert!(!options.filter().is_active());
    assert!(options.order_by().is_active());

    let result = options
        .apply_to(MemoryQueryable::new(people()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(names(&result.items), ["Cid", "Ann", "Bo"]);
}

#[tokio::test]
async fn test_negative_top_is_range_error_without_limit() {
    let (options, errors) = options("$top=-1");
    assert!(matches!(
        errors.for_parameter("$top").next(),
        Some(QueryError::Range(_))
    ));
    assert_eq!(options.top().value(), None);

    let result = options
        .apply_to(MemoryQueryable::new(people()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.items.len(), 3);
}

#[test]
fn test_non_integer_skip_is_parse_error() {
    let (options, errors) = options("$skip=two");
    assert!(matches!(
        errors.for_parameter("$skip").next(),
        Some(QueryError::Parse { .. })
    ));
    assert!(!options.skip().is_active());
}

#[test]
fn test_non_boolean_count_is_range_error() {
    let (options, errors) = options("$count=yes");
    assert!(matches!(
        errors.for_parameter("$count").next(),
        Some(QueryError::Range(_))
    ));
    assert!(!options.count().is_requested());
}

#[test]
fn test_every_bad_parameter_is_reported_independently() {
    let (options, errors) = options(
        "$filter=age gt&$orderby=salary&$skip=-3&$top=x&$count=1&$select=nope&$expand=team",
    );
    for parameter in ["$filter", "$orderby", "$skip", "$top", "$count", "$select", "$expand"] {
        assert!(errors.has_errors_for(parameter), "{parameter} not reported");
    }
    assert!(!options.filter().is_active());
    assert!(!options.order_by().is_active());
    assert!(!options.select_expand().is_active());
}

#[test]
fn test_blank_parameters_are_not_requested() {
    let (options, errors) = options("$filter=&$orderby=%20%20&$top=");
    assert!(errors.is_empty());
    assert!(!options.filter().is_active());
    assert!(!options.order_by().is_active());
    assert!(!options.top().is_active());
}

#[tokio::test]
async fn test_filter_membership_is_independent_of_order_and_paging() {
    let query = "$filter=age lt 45";
    let (all, _) = run(query, people()).await;
    let (page1, _) = run(&format!("{query}&$orderby=age desc&$top=1"), people()).await;
    let (page2, _) = run(&format!("{query}&$orderby=age desc&$skip=1"), people()).await;

    let mut paged: Vec<_> = names(&page1).into_iter().chain(names(&page2)).collect();
    paged.sort_unstable();
    let mut expected = names(&all);
    expected.sort_unstable();
    assert_eq!(paged, expected);
}

#[tokio::test]
async fn test_apply_is_idempotent() {
    let (options, _) = options("$filter=age gt 20&$orderby=age desc&$skip=1&$count=true");
    let cancel = CancellationToken::new();
    let first = options
        .apply_to(MemoryQueryable::new(people()), &cancel)
        .await
        .unwrap();
    let second = options
        .apply_to(MemoryQueryable::new(people()), &cancel)
        .await
        .unwrap();
    assert_eq!(first.items, second.items);
    assert_eq!(first.total_count, second.total_count);
    assert_eq!(names(&first.items), ["Ann", "Bo"]);
}

/// The six options initialized one at a time, outside `QueryOptions`.
#[derive(Default)]
struct Standalone {
    select_expand: SelectExpandOption,
    filter: FilterOption,
    order_by: OrderByOption,
    skip: SkipOption,
    top: TopOption,
    count: CountOption,
    errors: ValidationErrors,
}

impl Standalone {
    fn initialize(query: &str, order: [&str; 6]) -> Self {
        let registry = common::registry();
        let element_type = registry.element_type("Person").unwrap();
        let limits = QueryLimits::new().with_max_top(10);
        let ctx = ParseContext {
            registry: registry.as_ref(),
            element_type,
            limits: &limits,
        };
        let params = RawQueryParams::from_query_string(query).unwrap();

        let mut out = Self::default();
        for parameter in order {
            let sink = &mut out.errors;
            match parameter {
                "$select" => out.select_expand.initialize(&params, &ctx, sink),
                "$filter" => out.filter.initialize(&params, &ctx, sink),
                "$orderby" => out.order_by.initialize(&params, &ctx, sink),
                "$skip" => out.skip.initialize(&params, &ctx, sink),
                "$top" => out.top.initialize(&params, &ctx, sink),
                "$count" => out.count.initialize(&params, &ctx, sink),
                other => panic!("no option for {other}"),
            }
        }
        out
    }

    fn sorted_errors(&self) -> Vec<(String, String)> {
        let mut errors: Vec<_> = self
            .errors
            .iter()
            .map(|(parameter, error)| (parameter.to_owned(), error.to_string()))
            .collect();
        errors.sort();
        errors
    }

    fn assert_same_as(&self, other: &Self) {
        assert_eq!(self.filter.expr(), other.filter.expr());
        assert_eq!(self.order_by.keys(), other.order_by.keys());
        assert_eq!(self.skip.value(), other.skip.value());
        assert_eq!(self.top.value(), other.top.value());
        assert_eq!(self.count.is_requested(), other.count.is_requested());
        assert_eq!(self.select_expand.select(), other.select_expand.select());
        assert_eq!(self.select_expand.expand(), other.select_expand.expand());
        assert_eq!(
            self.select_expand.include_paths(),
            other.select_expand.include_paths()
        );
        assert_eq!(self.sorted_errors(), other.sorted_errors());
    }
}

const ORDERS: [[&str; 6]; 3] = [
    ["$select", "$filter", "$orderby", "$skip", "$top", "$count"],
    ["$count", "$top", "$skip", "$orderby", "$filter", "$select"],
    ["$orderby", "$count", "$select", "$top", "$filter", "$skip"],
];

#[test]
fn test_initialization_order_does_not_matter() {
    let query = "$select=name,age&$expand=manager($select=name),reports\
                 &$filter=age add 1 gt 20 and startswith(name,'A')\
                 &$orderby=department,age desc&$skip=1&$top=3&$count=true";
    let runs: Vec<Standalone> = ORDERS
        .iter()
        .map(|order| Standalone::initialize(query, *order))
        .collect();

    let first = &runs[0];
    assert!(first.errors.is_empty());
    assert!(first.filter.expr().is_some());
    assert_eq!(first.order_by.keys().len(), 2);
    assert_eq!(first.top.value(), Some(3));
    for other in &runs[1..] {
        first.assert_same_as(other);
    }
}

#[test]
fn test_initialization_order_does_not_change_errors() {
    let query = "$select=name,salary&$expand=team&$filter=age gt 'x'\
                 &$orderby=name,nope&$skip=-1&$top=50&$count=maybe";
    let runs: Vec<Standalone> = ORDERS
        .iter()
        .map(|order| Standalone::initialize(query, *order))
        .collect();

    let first = &runs[0];
    let parameters: Vec<String> = first.sorted_errors().into_iter().map(|(p, _)| p).collect();
    assert_eq!(
        parameters,
        ["$count", "$expand", "$filter", "$orderby", "$select", "$skip", "$top"]
    );
    for other in &runs[1..] {
        first.assert_same_as(other);
    }
}

#[tokio::test]
async fn test_requested_options_apply_the_same_for_any_parameter_order() {
    let (a, _) = options("$top=2&$orderby=name desc&$filter=age gt 20");
    let (b, _) = options("$filter=age gt 20&$orderby=name desc&$top=2");
    let cancel = CancellationToken::new();
    let ra = a.apply_to(MemoryQueryable::new(people()), &cancel).await.unwrap();
    let rb = b.apply_to(MemoryQueryable::new(people()), &cancel).await.unwrap();
    assert_eq!(ra.items, rb.items);
}

#[test]
fn test_expand_requests_includes() {
    let (options, errors) = options("$expand=manager,reports($expand=unit)");
    assert!(errors.is_empty());
    let source = options
        .select_expand()
        .apply::<common::Person, _>(MemoryQueryable::new(people()));
    assert_eq!(source.includes(), ["manager", "reports", "reports/unit"]);
}

#[tokio::test]
async fn test_filter_through_navigation() {
    let mut bo = person(2, "Bo", Some(25), "Eng");
    bo.manager = Some(Box::new(person(1, "Ann", Some(40), "Eng")));
    let items = vec![person(1, "Ann", Some(40), "Eng"), bo];

    let (matched, _) = run("$filter=manager/name eq 'Ann'", items.clone()).await;
    assert_eq!(names(&matched), ["Bo"]);

    let (top_level, _) = run("$filter=manager eq null", items).await;
    assert_eq!(names(&top_level), ["Ann"]);
}

#[tokio::test]
async fn test_cancelled_apply_returns_cancelled() {
    let (options, _) = options("$count=true");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = options
        .apply_to(MemoryQueryable::new(people()), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplyError::Cancelled));
}

enum Outcome {
    Stall,
    Fail,
}

/// In-memory source whose `materialize` never finishes or fails.
struct ScriptedSource {
    inner: MemoryQueryable<Person>,
    outcome: Outcome,
    started: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(outcome: Outcome) -> Self {
        Self {
            inner: MemoryQueryable::new(people()),
            outcome,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    fn map(self, f: impl FnOnce(MemoryQueryable<Person>) -> MemoryQueryable<Person>) -> Self {
        Self {
            inner: f(self.inner),
            ..self
        }
    }
}

#[async_trait::async_trait]
impl Queryable<Person> for ScriptedSource {
    type Error = std::io::Error;

    fn include(self, path: &str) -> Self {
        self.map(|q| q.include(path))
    }

    fn filter(self, predicate: &Expr) -> Self {
        self.map(|q| q.filter(predicate))
    }

    fn order_by(self, keys: &[OrderKey]) -> Self {
        self.map(|q| q.order_by(keys))
    }

    fn skip(self, n: u64) -> Self {
        self.map(|q| q.skip(n))
    }

    fn take(self, n: u64) -> Self {
        self.map(|q| q.take(n))
    }

    async fn count(&self) -> Result<u64, Self::Error> {
        self.inner.count().await.map_err(|never| match never {})
    }

    async fn materialize(self) -> Result<Vec<Person>, Self::Error> {
        self.started.store(true, Ordering::SeqCst);
        match self.outcome {
            Outcome::Stall => std::future::pending().await,
            Outcome::Fail => Err(std::io::Error::other("storage offline")),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_materialize_returns_cancelled() {
    let (options, _) = options("$filter=age gt 30&$count=true");
    let source = ScriptedSource::new(Outcome::Stall);
    let started = Arc::clone(&source.started);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), options.apply_to(source, &cancel))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ApplyError::Cancelled));
    assert!(started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failing_source_returns_source_error() {
    let (options, _) = options("$orderby=age");
    let err = options
        .apply_to(ScriptedSource::new(Outcome::Fail), &CancellationToken::new())
        .await
        .unwrap_err();
    let ApplyError::Source(source) = err else {
        panic!("expected a source error");
    };
    assert_eq!(source.to_string(), "storage offline");
}

#[tokio::test]
async fn test_huge_exponent_literal_is_range_error() {
    let (options, errors) = options("$filter=age add 1e9999999 gt 0");
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.for_parameter("$filter").next(),
        Some(QueryError::Range(_))
    ));
    assert!(!options.filter().is_active());

    let result = options
        .apply_to(MemoryQueryable::new(people()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.items.len(), 3);
}

#[test]
fn test_signed_paging_values_are_parse_errors() {
    let (options, errors) = options("$skip=%2B1&$top=%2B2");
    assert!(matches!(
        errors.for_parameter("$skip").next(),
        Some(QueryError::Parse { .. })
    ));
    assert!(matches!(
        errors.for_parameter("$top").next(),
        Some(QueryError::Parse { .. })
    ));
    assert!(!options.skip().is_active());
    assert!(!options.top().is_active());
}

#[test]
fn test_unregistered_element_type_is_configuration_error() {
    let empty = Arc::new(TypeRegistry::builder().build().unwrap());
    let err = QueryOptions::<common::Person>::new(empty).err().unwrap();
    assert_eq!(err, ConfigurationError::UnknownElementType("Person".to_owned()));
}

#[test]
fn test_limits_apply_to_parameters() {
    let params = odata_query::RawQueryParams::from_query_string("$top=500&$orderby=name,age,id").unwrap();
    let limits = odata_query::QueryLimits::new()
        .with_max_top(100)
        .with_max_orderby_fields(2);
    let mut options = QueryOptions::<common::Person>::new(common::registry())
        .unwrap()
        .with_limits(limits);
    let mut errors = odata_query::ValidationErrors::new();
    options.initialize(&params, &mut errors);

    assert!(matches!(errors.for_parameter("$top").next(), Some(QueryError::Range(_))));
    assert!(matches!(errors.for_parameter("$orderby").next(), Some(QueryError::Range(_))));
}

#[test]
#[tracing_test::traced_test]
fn test_rejected_parameter_is_logged() {
    let (_, errors) = options("$top=-5");
    assert_eq!(errors.len(), 1);
    assert!(logs_contain("query parameter rejected"));
}
