//! Runtime access to record fields by name.
//!
//! [`Record`] is object safe so that navigation values can hand out related
//! records of other types as `&dyn Record`.
//!
//! # Example
//!
//! ```rust
//! use odata_query::{Entity, FieldValue, Record};
//!
//! #[derive(serde::Serialize)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     manager: Option<Box<Person>>,
//! }
//!
//! impl Record for Person {
//!     fn field(&self, name: &str) -> Option<FieldValue<'_>> {
//!         Some(match name {
//!             "id" => FieldValue::value(self.id),
//!             "name" => FieldValue::value(&self.name),
//!             "manager" => FieldValue::one(self.manager.as_deref()),
//!             _ => return None,
//!         })
//!     }
//! }
//!
//! impl Entity for Person {
//!     const TYPE_NAME: &'static str = "Person";
//! }
//! ```

use crate::value::{IntoValue, Value};

/// Value of a single field on a record.
pub enum FieldValue<'a> {
    Value(Value),
    One(Option<&'a dyn Record>),
    Many(Vec<&'a dyn Record>),
}

impl<'a> FieldValue<'a> {
    pub fn value(value: impl IntoValue) -> Self {
        FieldValue::Value(value.into_value())
    }

    pub fn one<R: Record>(related: Option<&'a R>) -> Self {
        FieldValue::One(related.map(|r| r as &dyn Record))
    }

    pub fn many<R: Record>(related: &'a [R]) -> Self {
        FieldValue::Many(related.iter().map(|r| r as &dyn Record).collect())
    }
}

impl std::fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldValue::One(r) => f.debug_tuple("One").field(&r.is_some()).finish(),
            FieldValue::Many(rs) => f.debug_tuple("Many").field(&rs.len()).finish(),
        }
    }
}

/// Field access used to evaluate filters and sort keys.
pub trait Record: Send + Sync {
    /// Value of the field called `name`, or `None` when no such field exists.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// A record type that is the element type of a queryable collection.
///
/// `TYPE_NAME` must name an element type in the [`TypeRegistry`](crate::TypeRegistry)
/// and the serialized keys of the type must match its field names.
pub trait Entity: Record + serde::Serialize {
    const TYPE_NAME: &'static str;
}
