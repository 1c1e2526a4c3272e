//! Scalar values and value kinds shared by records, literals and evaluation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Largest decimal exponent (either sign) a number in an expression may carry.
/// Addition and subtraction rescale operands to a common scale, so this bounds
/// the size of every intermediate value.
pub const MAX_NUMBER_EXPONENT: i64 = 1000;

pub(crate) fn exponent_in_range(n: &BigDecimal) -> bool {
    let (_, scale) = n.as_bigint_and_exponent();
    scale.unsigned_abs() <= MAX_NUMBER_EXPONENT.unsigned_abs()
}

/// Logical field types an element type can declare for its scalar fields.
///
/// Integer, floating and decimal fields all surface as [`ValueKind::Number`]
/// inside expressions; the distinction only matters to a backing store that
/// translates the predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
    Date,
    Time,
    Decimal,
}

impl FieldKind {
    #[must_use]
    pub fn value_kind(self) -> ValueKind {
        match self {
            FieldKind::String => ValueKind::String,
            FieldKind::I64 | FieldKind::F64 | FieldKind::Decimal => ValueKind::Number,
            FieldKind::Bool => ValueKind::Boolean,
            FieldKind::Uuid => ValueKind::Guid,
            FieldKind::DateTimeUtc => ValueKind::DateTime,
            FieldKind::Date => ValueKind::Date,
            FieldKind::Time => ValueKind::Time,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "String"),
            FieldKind::I64 => write!(f, "I64"),
            FieldKind::F64 => write!(f, "F64"),
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::Uuid => write!(f, "Uuid"),
            FieldKind::DateTimeUtc => write!(f, "DateTimeUtc"),
            FieldKind::Date => write!(f, "Date"),
            FieldKind::Time => write!(f, "Time"),
            FieldKind::Decimal => write!(f, "Decimal"),
        }
    }
}

/// Kind inferred for every expression node while parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    DateTime,
    Date,
    Time,
    Guid,
    /// The `null` literal.
    Null,
    /// A single-valued navigation.
    Entity,
    /// A collection-valued navigation.
    Collection,
}

impl ValueKind {
    /// Kinds that can be stored in a scalar field and compared with `eq`/`ne`.
    #[must_use]
    pub fn is_scalar(self) -> bool {
        !matches!(
            self,
            ValueKind::Null | ValueKind::Entity | ValueKind::Collection
        )
    }

    /// Kinds that support `gt`, `ge`, `lt`, `le` and ordering.
    #[must_use]
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            ValueKind::Number
                | ValueKind::String
                | ValueKind::DateTime
                | ValueKind::Date
                | ValueKind::Time
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::DateTime => "datetime",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Guid => "guid",
            ValueKind::Null => "null",
            ValueKind::Entity => "entity",
            ValueKind::Collection => "collection",
        };
        f.write_str(name)
    }
}

/// A scalar value: a literal in an expression or a field read from a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    String(String),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Uuid(_) => ValueKind::Guid,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::String(_) => ValueKind::String,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two non-null values of the same kind.
    ///
    /// Returns `None` when either side is null or the kinds differ.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, then values of the same kind.
    #[must_use]
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }
}

/// Renders the value as an `OData` literal.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Conversion of Rust field values into [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_owned())
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::String(self.clone())
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoValue for u64 {
    fn into_value(self) -> Value {
        Value::Number(self.into())
    }
}

/// Non-finite floats have no `OData` representation and become `null`.
impl IntoValue for f64 {
    fn into_value(self) -> Value {
        if !self.is_finite() {
            return Value::Null;
        }
        BigDecimal::from_str(&self.to_string()).map_or(Value::Null, Value::Number)
    }
}

impl IntoValue for BigDecimal {
    fn into_value(self) -> Value {
        Value::Number(self)
    }
}

impl IntoValue for &BigDecimal {
    fn into_value(self) -> Value {
        Value::Number(self.clone())
    }
}

impl IntoValue for Uuid {
    fn into_value(self) -> Value {
        Value::Uuid(self)
    }
}

impl IntoValue for DateTime<Utc> {
    fn into_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl IntoValue for NaiveDate {
    fn into_value(self) -> Value {
        Value::Date(self)
    }
}

impl IntoValue for NaiveTime {
    fn into_value(self) -> Value {
        Value::Time(self)
    }
}

impl<V: IntoValue> IntoValue for Option<V> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}
