//! `$select` / `$expand` projection of serialized items.
//!
//! Projection runs when results are encoded, after filtering and ordering, so
//! it never hides a field those steps depend on.

use serde_json::{Map, Value};

/// Shape of one projected object.
///
/// Navigation fields are dropped unless expanded. Structural fields are kept
/// when `select` is `None` or names them; selected fields missing from the
/// serialized item stay absent rather than null-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    select: Option<Vec<String>>,
    navigations: Vec<String>,
    expand: Vec<(String, Projection)>,
}

impl Projection {
    #[must_use]
    pub fn new(
        select: Option<Vec<String>>,
        navigations: Vec<String>,
        expand: Vec<(String, Projection)>,
    ) -> Self {
        Self {
            select,
            navigations,
            expand,
        }
    }

    /// Selected structural fields, `None` when every field is kept.
    #[must_use]
    pub fn selected(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Expanded navigations with their nested projections.
    #[must_use]
    pub fn expanded(&self) -> &[(String, Projection)] {
        &self.expand
    }

    /// Project a serialized item (or array of items).
    #[must_use]
    pub fn project(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.project_object(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.project(v)).collect()),
            other => other.clone(),
        }
    }

    fn project_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut projected = Map::new();
        for (key, val) in map {
            if let Some((_, nested)) = self.expand.iter().find(|(name, _)| name == key) {
                projected.insert(key.clone(), nested.project(val));
            } else if !self.navigations.contains(key)
                && self
                    .select
                    .as_ref()
                    .is_none_or(|fields| fields.contains(key))
            {
                projected.insert(key.clone(), val.clone());
            }
        }
        projected
    }
}
