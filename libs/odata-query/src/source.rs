//! The abstract collection query options are applied to.

use std::cmp::Ordering;
use std::convert::Infallible;

use async_trait::async_trait;

use crate::ast::{Expr, OrderKey};
use crate::record::Record;

/// A lazily composed query over records of type `T`.
///
/// Builder methods only describe the query; `count` and `materialize` execute
/// it. `include` names a navigation path (`reports/department`) the source
/// must load so it is present when items are encoded.
#[async_trait]
pub trait Queryable<T>: Sized + Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    #[must_use]
    fn include(self, path: &str) -> Self;

    #[must_use]
    fn filter(self, predicate: &Expr) -> Self;

    /// Stable sort by `keys`, most significant first.
    #[must_use]
    fn order_by(self, keys: &[OrderKey]) -> Self;

    #[must_use]
    fn skip(self, n: u64) -> Self;

    #[must_use]
    fn take(self, n: u64) -> Self;

    /// Number of items the query currently describes.
    async fn count(&self) -> Result<u64, Self::Error>;

    async fn materialize(self) -> Result<Vec<T>, Self::Error>;
}

/// [`Queryable`] over an owned `Vec`, evaluating expressions directly.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueryable<T> {
    items: Vec<T>,
    includes: Vec<String>,
}

impl<T> MemoryQueryable<T> {
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            includes: Vec::new(),
        }
    }

    /// Navigation paths requested through `include`, in request order.
    #[must_use]
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> From<Vec<T>> for MemoryQueryable<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Ascending compares nulls first; descending reverses, so nulls go last.
fn compare_by_keys(keys: &[OrderKey], a: &dyn Record, b: &dyn Record) -> Ordering {
    keys.iter()
        .map(|key| key.dir.apply(key.path.read(a).sort_cmp(&key.path.read(b))))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl<T: Record + 'static> Queryable<T> for MemoryQueryable<T> {
    type Error = Infallible;

    fn include(mut self, path: &str) -> Self {
        if !self.includes.iter().any(|p| p == path) {
            self.includes.push(path.to_owned());
        }
        self
    }

    fn filter(mut self, predicate: &Expr) -> Self {
        self.items.retain(|item| predicate.matches(item));
        self
    }

    fn order_by(mut self, keys: &[OrderKey]) -> Self {
        if !keys.is_empty() {
            self.items.sort_by(|a, b| compare_by_keys(keys, a, b));
        }
        self
    }

    fn skip(mut self, n: u64) -> Self {
        let n = saturating_usize(n).min(self.items.len());
        self.items.drain(..n);
        self
    }

    fn take(mut self, n: u64) -> Self {
        self.items.truncate(saturating_usize(n));
        self
    }

    async fn count(&self) -> Result<u64, Infallible> {
        Ok(u64::try_from(self.items.len()).unwrap_or(u64::MAX))
    }

    async fn materialize(self) -> Result<Vec<T>, Infallible> {
        Ok(self.items)
    }
}
