//! In-memory evaluation of typed expressions against [`Record`]s.
//!
//! Null handling follows three-valued logic: comparisons involving null are
//! false (except explicit `eq null`/`ne null` checks), functions and
//! arithmetic propagate null, and `and`/`or`/`not` are Kleene operators.

use bigdecimal::{BigDecimal, Zero};
use chrono::{Datelike, Timelike};

use crate::ast::{ArithmeticOperator, CompareOperator, Expr, ExprNode, Function};
use crate::record::{FieldValue, Record};
use crate::schema::PropertyPath;
use crate::value::{IntoValue, Value, exponent_in_range};

/// Result of reading an expression operand from a record.
enum Operand {
    Scalar(Value),
    /// A present single-valued navigation.
    Entity,
    /// A present collection-valued navigation.
    Collection,
}

impl Operand {
    fn is_null(&self) -> bool {
        matches!(self, Operand::Scalar(Value::Null))
    }

    fn into_value(self) -> Value {
        match self {
            Operand::Scalar(v) => v,
            Operand::Entity | Operand::Collection => Value::Null,
        }
    }
}

impl PropertyPath {
    /// Read the leaf value from `record`.
    ///
    /// An absent intermediate navigation yields `Value::Null`. Navigation
    /// leaves also yield `Value::Null`; use a filter to test their presence.
    #[must_use]
    pub fn read(&self, record: &dyn Record) -> Value {
        read_path(self, record).into_value()
    }
}

fn read_path(path: &PropertyPath, record: &dyn Record) -> Operand {
    let Some((last, init)) = path.segments().split_last() else {
        return Operand::Scalar(Value::Null);
    };

    let mut current = record;
    for segment in init {
        match current.field(segment) {
            Some(FieldValue::One(Some(next))) => current = next,
            _ => return Operand::Scalar(Value::Null),
        }
    }

    match current.field(last) {
        Some(FieldValue::Value(v)) => Operand::Scalar(v),
        Some(FieldValue::One(Some(_))) => Operand::Entity,
        Some(FieldValue::Many(_)) => Operand::Collection,
        Some(FieldValue::One(None)) | None => Operand::Scalar(Value::Null),
    }
}

impl Expr {
    /// Whether `record` satisfies this predicate; only a definite `true` does.
    #[must_use]
    pub fn matches(&self, record: &dyn Record) -> bool {
        matches!(self.evaluate(record), Value::Bool(true))
    }

    /// Evaluate to a scalar value. Navigation-valued nodes evaluate to null.
    #[must_use]
    pub fn evaluate(&self, record: &dyn Record) -> Value {
        self.operand(record).into_value()
    }

    fn operand(&self, record: &dyn Record) -> Operand {
        let value = match self.node() {
            ExprNode::Value(v) => v.clone(),
            ExprNode::Property(path) => return read_path(path, record),
            ExprNode::Not(x) => match x.evaluate(record) {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            },
            ExprNode::Negate(x) => match x.evaluate(record) {
                Value::Number(n) => Value::Number(-n),
                _ => Value::Null,
            },
            ExprNode::And(a, b) => match a.evaluate(record) {
                Value::Bool(false) => Value::Bool(false),
                left => match (left, b.evaluate(record)) {
                    (_, Value::Bool(false)) => Value::Bool(false),
                    (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                    _ => Value::Null,
                },
            },
            ExprNode::Or(a, b) => match a.evaluate(record) {
                Value::Bool(true) => Value::Bool(true),
                left => match (left, b.evaluate(record)) {
                    (_, Value::Bool(true)) => Value::Bool(true),
                    (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                    _ => Value::Null,
                },
            },
            ExprNode::Compare(a, op, b) => Value::Bool(compare(a, *op, b, record)),
            ExprNode::Arithmetic(a, op, b) => {
                match (a.evaluate(record), b.evaluate(record)) {
                    (Value::Number(x), Value::Number(y)) => arithmetic(&x, *op, &y),
                    _ => Value::Null,
                }
            }
            ExprNode::In(a, items) => {
                let needle = a.evaluate(record);
                Value::Bool(items.iter().any(|item| {
                    needle.compare(&item.evaluate(record)) == Some(std::cmp::Ordering::Equal)
                }))
            }
            ExprNode::Function(f, args) => {
                let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(record)).collect();
                call(*f, &values)
            }
        };
        Operand::Scalar(value)
    }
}

fn compare(left: &Expr, op: CompareOperator, right: &Expr, record: &dyn Record) -> bool {
    let l = left.operand(record);
    let r = right.operand(record);

    if l.is_null() || r.is_null() {
        let null_check =
            op.is_equality() && (left.is_null_literal() || right.is_null_literal());
        if !null_check {
            return false;
        }
        let both_null = l.is_null() && r.is_null();
        return if op == CompareOperator::Eq {
            both_null
        } else {
            !both_null
        };
    }

    match (l, r) {
        (Operand::Scalar(a), Operand::Scalar(b)) => a.compare(&b).is_some_and(|o| op.test(o)),
        _ => false,
    }
}

/// Results whose exponent leaves the literal range are null, so chained
/// operations cannot grow operands without bound.
fn arithmetic(x: &BigDecimal, op: ArithmeticOperator, y: &BigDecimal) -> Value {
    let n = match op {
        ArithmeticOperator::Add => x + y,
        ArithmeticOperator::Sub => x - y,
        ArithmeticOperator::Mul => x * y,
        ArithmeticOperator::Div | ArithmeticOperator::Mod if y.is_zero() => return Value::Null,
        ArithmeticOperator::Div => x / y,
        ArithmeticOperator::Mod => x.clone() % y.clone(),
    };
    if exponent_in_range(&n) {
        Value::Number(n)
    } else {
        Value::Null
    }
}

fn count(n: usize) -> Value {
    u64::try_from(n).map_or(Value::Null, IntoValue::into_value)
}

fn call(function: Function, args: &[Value]) -> Value {
    if args.iter().any(Value::is_null) {
        return Value::Null;
    }
    match (function, args) {
        (Function::Contains, [Value::String(s), Value::String(t)]) => {
            Value::Bool(s.contains(t.as_str()))
        }
        (Function::StartsWith, [Value::String(s), Value::String(t)]) => {
            Value::Bool(s.starts_with(t.as_str()))
        }
        (Function::EndsWith, [Value::String(s), Value::String(t)]) => {
            Value::Bool(s.ends_with(t.as_str()))
        }
        (Function::IndexOf, [Value::String(s), Value::String(t)]) => match s.find(t.as_str()) {
            Some(byte) => count(s[..byte].chars().count()),
            None => (-1_i64).into_value(),
        },
        (Function::Concat, [Value::String(s), Value::String(t)]) => {
            Value::String(format!("{s}{t}"))
        }
        (Function::ToLower, [Value::String(s)]) => Value::String(s.to_lowercase()),
        (Function::ToUpper, [Value::String(s)]) => Value::String(s.to_uppercase()),
        (Function::Trim, [Value::String(s)]) => Value::String(s.trim().to_owned()),
        (Function::Length, [Value::String(s)]) => count(s.chars().count()),
        (Function::Year, [Value::DateTime(dt)]) => dt.year().into_value(),
        (Function::Year, [Value::Date(d)]) => d.year().into_value(),
        (Function::Month, [Value::DateTime(dt)]) => dt.month().into_value(),
        (Function::Month, [Value::Date(d)]) => d.month().into_value(),
        (Function::Day, [Value::DateTime(dt)]) => dt.day().into_value(),
        (Function::Day, [Value::Date(d)]) => d.day().into_value(),
        (Function::Hour, [Value::DateTime(dt)]) => dt.hour().into_value(),
        (Function::Hour, [Value::Time(t)]) => t.hour().into_value(),
        (Function::Minute, [Value::DateTime(dt)]) => dt.minute().into_value(),
        (Function::Minute, [Value::Time(t)]) => t.minute().into_value(),
        (Function::Second, [Value::DateTime(dt)]) => dt.second().into_value(),
        (Function::Second, [Value::Time(t)]) => t.second().into_value(),
        // unreachable for type-checked trees
        _ => Value::Null,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::parser::parse_filter;
    use crate::schema::{ElementType, TypeRegistry};
    use crate::value::FieldKind;

    struct Person {
        name: &'static str,
        age: Option<i64>,
        manager: Option<Box<Person>>,
        reports: Vec<Person>,
    }

    impl Record for Person {
        fn field(&self, name: &str) -> Option<FieldValue<'_>> {
            Some(match name {
                "name" => FieldValue::value(self.name),
                "age" => FieldValue::value(self.age),
                "manager" => FieldValue::one(self.manager.as_deref()),
                "reports" => FieldValue::many(&self.reports),
                _ => return None,
            })
        }
    }

    fn person(name: &'static str, age: Option<i64>) -> Person {
        Person {
            name,
            age,
            manager: None,
            reports: Vec::new(),
        }
    }

    fn eval(input: &str, record: &Person) -> Value {
        let reg = TypeRegistry::builder()
            .element_type(
                ElementType::builder("Person")
                    .field("name", FieldKind::String)
                    .nullable_field("age", FieldKind::I64)
                    .navigation("manager", "Person")
                    .collection("reports", "Person"),
            )
            .build()
            .unwrap();
        let expr = parse_filter(input, &reg, reg.element_type("Person").unwrap()).unwrap();
        expr.evaluate(record)
    }

    #[test]
    fn comparisons() {
        let ann = person("Ann", Some(40));
        assert_eq!(eval("age gt 30", &ann), Value::Bool(true));
        assert_eq!(eval("age le 30", &ann), Value::Bool(false));
        assert_eq!(eval("name eq 'Ann'", &ann), Value::Bool(true));
        assert_eq!(eval("name lt 'Bo'", &ann), Value::Bool(true));
    }

    #[test]
    fn null_comparisons_are_false_unless_explicit() {
        let anon = person("X", None);
        assert_eq!(eval("age gt 30", &anon), Value::Bool(false));
        assert_eq!(eval("age le 30", &anon), Value::Bool(false));
        assert_eq!(eval("age ne 30", &anon), Value::Bool(false));
        assert_eq!(eval("age eq null", &anon), Value::Bool(true));
        assert_eq!(eval("age ne null", &anon), Value::Bool(false));
        assert_eq!(eval("null eq null", &anon), Value::Bool(true));
    }

    #[test]
    fn navigation_null_checks() {
        let mut bo = person("Bo", Some(25));
        assert_eq!(eval("manager eq null", &bo), Value::Bool(true));
        assert_eq!(eval("manager/name eq 'Ann'", &bo), Value::Bool(false));

        bo.manager = Some(Box::new(person("Ann", Some(40))));
        assert_eq!(eval("manager ne null", &bo), Value::Bool(true));
        assert_eq!(eval("manager/name eq 'Ann'", &bo), Value::Bool(true));
        assert_eq!(eval("manager/age add age eq 65", &bo), Value::Bool(true));
    }

    #[test]
    fn three_valued_logic() {
        let anon = person("X", None);
        // age add 1 is null; null gt 0 is false, so not(...) is true
        assert_eq!(eval("not (age add 1 gt 0)", &anon), Value::Bool(true));
        assert_eq!(eval("age gt 0 or name eq 'X'", &anon), Value::Bool(true));
        assert_eq!(eval("age gt 0 and name eq 'X'", &anon), Value::Bool(false));
    }

    #[test]
    fn arithmetic_and_division_by_zero() {
        let ann = person("Ann", Some(40));
        assert_eq!(eval("age div 8 eq 5", &ann), Value::Bool(true));
        assert_eq!(eval("age mod 7 eq 5", &ann), Value::Bool(true));
        assert_eq!(eval("-age eq -40", &ann), Value::Bool(true));
        assert_eq!(eval("age div 0 eq 0", &ann), Value::Bool(false));
        assert_eq!(eval("age div 0 eq null", &ann), Value::Bool(true));
    }

    #[test]
    fn oversized_arithmetic_results_are_null() {
        let ann = person("Ann", Some(40));
        assert_eq!(eval("age mul 1e600 mul 1e600 eq null", &ann), Value::Bool(true));
        assert_eq!(eval("age mul 1e600 mul 1e600 add 1 gt 0", &ann), Value::Bool(false));
        assert_eq!(eval("age mul 1e600 gt 0", &ann), Value::Bool(true));
    }

    #[test]
    fn string_functions() {
        let ann = person("  Ann  ", Some(40));
        assert_eq!(eval("trim(name) eq 'Ann'", &ann), Value::Bool(true));
        assert_eq!(eval("length(name) eq 7", &ann), Value::Bool(true));
        assert_eq!(eval("indexof(name,'nn') eq 3", &ann), Value::Bool(true));
        assert_eq!(eval("indexof(name,'zz') eq -1", &ann), Value::Bool(true));
        assert_eq!(eval("contains(toupper(name),'ANN')", &ann), Value::Bool(true));
        assert_eq!(eval("endswith(concat(trim(name),'!'),'n!')", &ann), Value::Bool(true));
    }

    #[test]
    fn in_list() {
        let ann = person("Ann", Some(40));
        assert_eq!(eval("name in ('Bo','Ann')", &ann), Value::Bool(true));
        assert_eq!(eval("age in (1, 2, null)", &ann), Value::Bool(false));
        assert_eq!(eval("age in (null)", &person("X", None)), Value::Bool(false));
    }

    #[test]
    fn path_read() {
        let reg = TypeRegistry::builder()
            .element_type(
                ElementType::builder("Person")
                    .field("name", FieldKind::String)
                    .navigation("manager", "Person"),
            )
            .build()
            .unwrap();
        let person_type = reg.element_type("Person").unwrap();
        let path = reg.resolve_path(person_type, &["manager", "name"]).unwrap();

        let mut bo = person("Bo", None);
        assert!(path.read(&bo).is_null());
        bo.manager = Some(Box::new(person("Ann", None)));
        assert_eq!(path.read(&bo), Value::String("Ann".to_owned()));
    }
}
