//! Typed expression tree produced by the parser.
//!
//! Every node carries the [`ValueKind`] inferred for it. The constructors on
//! [`Expr`] enforce the operator/function compatibility table, so a tree that
//! exists is always well-typed.

use std::cmp::Ordering;
use std::fmt;

use crate::errors::QueryError;
use crate::schema::PropertyPath;
use crate::value::{Value, ValueKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOperator {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            CompareOperator::Eq => "eq",
            CompareOperator::Ne => "ne",
            CompareOperator::Gt => "gt",
            CompareOperator::Ge => "ge",
            CompareOperator::Lt => "lt",
            CompareOperator::Le => "le",
        }
    }

    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOperator::Eq | CompareOperator::Ne)
    }

    /// Whether `ordering` (left relative to right) satisfies the operator.
    #[must_use]
    pub fn test(self, ordering: Ordering) -> bool {
        match self {
            CompareOperator::Eq => ordering == Ordering::Equal,
            CompareOperator::Ne => ordering != Ordering::Equal,
            CompareOperator::Gt => ordering == Ordering::Greater,
            CompareOperator::Ge => ordering != Ordering::Less,
            CompareOperator::Lt => ordering == Ordering::Less,
            CompareOperator::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOperator {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "add",
            ArithmeticOperator::Sub => "sub",
            ArithmeticOperator::Mul => "mul",
            ArithmeticOperator::Div => "div",
            ArithmeticOperator::Mod => "mod",
        }
    }
}

const STRING: &[ValueKind] = &[ValueKind::String];
const DATE_PART: &[ValueKind] = &[ValueKind::DateTime, ValueKind::Date];
const TIME_PART: &[ValueKind] = &[ValueKind::DateTime, ValueKind::Time];

/// Built-in functions callable from `$filter`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Contains,
    StartsWith,
    EndsWith,
    IndexOf,
    Concat,
    ToLower,
    ToUpper,
    Trim,
    Length,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl Function {
    const ALL: [Function; 15] = [
        Function::Contains,
        Function::StartsWith,
        Function::EndsWith,
        Function::IndexOf,
        Function::Concat,
        Function::ToLower,
        Function::ToUpper,
        Function::Trim,
        Function::Length,
        Function::Year,
        Function::Month,
        Function::Day,
        Function::Hour,
        Function::Minute,
        Function::Second,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::IndexOf => "indexof",
            Function::Concat => "concat",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Trim => "trim",
            Function::Length => "length",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
        }
    }

    /// Accepted kinds for each parameter.
    fn parameters(self) -> &'static [&'static [ValueKind]] {
        match self {
            Function::Contains
            | Function::StartsWith
            | Function::EndsWith
            | Function::IndexOf
            | Function::Concat => &[STRING, STRING],
            Function::ToLower | Function::ToUpper | Function::Trim | Function::Length => &[STRING],
            Function::Year | Function::Month | Function::Day => &[DATE_PART],
            Function::Hour | Function::Minute | Function::Second => &[TIME_PART],
        }
    }

    fn result(self) -> ValueKind {
        match self {
            Function::Contains | Function::StartsWith | Function::EndsWith => ValueKind::Boolean,
            Function::Concat | Function::ToLower | Function::ToUpper | Function::Trim => {
                ValueKind::String
            }
            Function::IndexOf
            | Function::Length
            | Function::Year
            | Function::Month
            | Function::Day
            | Function::Hour
            | Function::Minute
            | Function::Second => ValueKind::Number,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprNode {
    Value(Value),
    Property(PropertyPath),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOperator, Box<Expr>),
    Arithmetic(Box<Expr>, ArithmeticOperator, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Function(Function, Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    kind: ValueKind,
    node: ExprNode,
}

impl Expr {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub fn node(&self) -> &ExprNode {
        &self.node
    }

    #[must_use]
    pub fn literal(value: Value) -> Self {
        Self {
            kind: value.kind(),
            node: ExprNode::Value(value),
        }
    }

    #[must_use]
    pub fn property(path: PropertyPath) -> Self {
        Self {
            kind: path.kind(),
            node: ExprNode::Property(path),
        }
    }

    #[must_use]
    pub fn is_null_literal(&self) -> bool {
        matches!(self.node, ExprNode::Value(Value::Null))
    }

    /// `not operand`
    ///
    /// # Errors
    /// `QueryError::TypeMismatch` unless the operand is boolean.
    pub fn logical_not(operand: Expr) -> Result<Self, QueryError> {
        require(operand.kind == ValueKind::Boolean, || {
            format!("'not' requires a boolean operand, found {}", operand.kind)
        })?;
        Ok(Self {
            kind: ValueKind::Boolean,
            node: ExprNode::Not(Box::new(operand)),
        })
    }

    /// `-operand`; a numeric literal is folded into a negative literal.
    ///
    /// # Errors
    /// `QueryError::TypeMismatch` unless the operand is a number.
    pub fn negate(operand: Expr) -> Result<Self, QueryError> {
        require(operand.kind == ValueKind::Number, || {
            format!("'-' requires a numeric operand, found {}", operand.kind)
        })?;
        if let ExprNode::Value(Value::Number(n)) = operand.node {
            return Ok(Self::literal(Value::Number(-n)));
        }
        Ok(Self {
            kind: ValueKind::Number,
            node: ExprNode::Negate(Box::new(operand)),
        })
    }

    /// # Errors
    /// `QueryError::TypeMismatch` unless both operands are boolean.
    pub fn and(left: Expr, right: Expr) -> Result<Self, QueryError> {
        require_logical("and", &left, &right)?;
        Ok(Self {
            kind: ValueKind::Boolean,
            node: ExprNode::And(Box::new(left), Box::new(right)),
        })
    }

    /// # Errors
    /// `QueryError::TypeMismatch` unless both operands are boolean.
    pub fn or(left: Expr, right: Expr) -> Result<Self, QueryError> {
        require_logical("or", &left, &right)?;
        Ok(Self {
            kind: ValueKind::Boolean,
            node: ExprNode::Or(Box::new(left), Box::new(right)),
        })
    }

    /// # Errors
    /// `QueryError::TypeMismatch` when the operand kinds cannot be compared
    /// with `op`.
    pub fn compare(left: Expr, op: CompareOperator, right: Expr) -> Result<Self, QueryError> {
        let (l, r) = (left.kind, right.kind);
        let allowed = if op.is_equality() {
            (l == r && l.is_scalar())
                || (l == ValueKind::Null && (r.is_scalar() || matches!(r, ValueKind::Null | ValueKind::Entity)))
                || (r == ValueKind::Null && (l.is_scalar() || l == ValueKind::Entity))
        } else {
            l == r && l.is_ordered()
        };
        require(allowed, || {
            format!("'{}' cannot compare {l} with {r}", op.keyword())
        })?;
        Ok(Self {
            kind: ValueKind::Boolean,
            node: ExprNode::Compare(Box::new(left), op, Box::new(right)),
        })
    }

    /// # Errors
    /// `QueryError::TypeMismatch` unless both operands are numbers.
    pub fn arithmetic(left: Expr, op: ArithmeticOperator, right: Expr) -> Result<Self, QueryError> {
        require(
            left.kind == ValueKind::Number && right.kind == ValueKind::Number,
            || {
                format!(
                    "'{}' requires numeric operands, found {} and {}",
                    op.keyword(),
                    left.kind,
                    right.kind
                )
            },
        )?;
        Ok(Self {
            kind: ValueKind::Number,
            node: ExprNode::Arithmetic(Box::new(left), op, Box::new(right)),
        })
    }

    /// `left in (items...)`
    ///
    /// # Errors
    /// `QueryError::TypeMismatch` unless `left` is scalar and every item has
    /// the same kind (or is `null`).
    pub fn in_list(left: Expr, items: Vec<Expr>) -> Result<Self, QueryError> {
        require(left.kind.is_scalar(), || {
            format!("'in' requires a scalar operand, found {}", left.kind)
        })?;
        if let Some(bad) = items
            .iter()
            .find(|item| item.kind != left.kind && item.kind != ValueKind::Null)
        {
            return Err(QueryError::type_mismatch(format!(
                "'in' list item of kind {} does not match {}",
                bad.kind, left.kind
            )));
        }
        Ok(Self {
            kind: ValueKind::Boolean,
            node: ExprNode::In(Box::new(left), items),
        })
    }

    /// # Errors
    /// `QueryError::TypeMismatch` on a wrong argument count or kind.
    pub fn call(function: Function, args: Vec<Expr>) -> Result<Self, QueryError> {
        let params = function.parameters();
        require(params.len() == args.len(), || {
            format!(
                "{}() takes {} argument(s), {} given",
                function.name(),
                params.len(),
                args.len()
            )
        })?;
        for (i, (accepted, arg)) in params.iter().zip(&args).enumerate() {
            require(accepted.contains(&arg.kind), || {
                format!(
                    "argument {} of {}() cannot be {}",
                    i + 1,
                    function.name(),
                    arg.kind
                )
            })?;
        }
        Ok(Self {
            kind: function.result(),
            node: ExprNode::Function(function, args),
        })
    }

    /// Number of nodes in the tree, used for complexity limits.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + match &self.node {
            ExprNode::Value(_) | ExprNode::Property(_) => 0,
            ExprNode::Not(x) | ExprNode::Negate(x) => x.node_count(),
            ExprNode::And(a, b)
            | ExprNode::Or(a, b)
            | ExprNode::Compare(a, _, b)
            | ExprNode::Arithmetic(a, _, b) => a.node_count() + b.node_count(),
            ExprNode::In(a, list) => a.node_count() + list.iter().map(Expr::node_count).sum::<usize>(),
            ExprNode::Function(_, args) => args.iter().map(Expr::node_count).sum::<usize>(),
        }
    }

    /// Binding strength, mirrors the parser's precedence table.
    fn precedence(&self) -> u8 {
        match &self.node {
            ExprNode::Or(..) => 1,
            ExprNode::And(..) => 2,
            ExprNode::Compare(_, op, _) if op.is_equality() => 3,
            ExprNode::Compare(..) | ExprNode::In(..) => 4,
            ExprNode::Arithmetic(_, ArithmeticOperator::Add | ArithmeticOperator::Sub, _) => 5,
            ExprNode::Arithmetic(..) => 6,
            ExprNode::Not(_) | ExprNode::Negate(_) => 7,
            ExprNode::Value(_) | ExprNode::Property(_) | ExprNode::Function(..) => 8,
        }
    }
}

fn require(ok: bool, message: impl FnOnce() -> String) -> Result<(), QueryError> {
    if ok {
        Ok(())
    } else {
        Err(QueryError::type_mismatch(message()))
    }
}

fn require_logical(keyword: &str, left: &Expr, right: &Expr) -> Result<(), QueryError> {
    require(
        left.kind == ValueKind::Boolean && right.kind == ValueKind::Boolean,
        || {
            format!(
                "'{keyword}' requires boolean operands, found {} and {}",
                left.kind, right.kind
            )
        },
    )
}

struct Operand<'a> {
    expr: &'a Expr,
    parenthesize: bool,
}

impl<'a> Operand<'a> {
    fn new(expr: &'a Expr, parenthesize: bool) -> Self {
        Self { expr, parenthesize }
    }
}

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parenthesize {
            write!(f, "({})", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

/// Canonical `OData` rendering with the minimum parentheses.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = self.precedence();
        let left = |expr: &Expr| expr.precedence() < prec;
        let right = |expr: &Expr| expr.precedence() <= prec;
        match &self.node {
            ExprNode::Value(v) => write!(f, "{v}"),
            ExprNode::Property(p) => write!(f, "{p}"),
            ExprNode::Not(x) => write!(f, "not {}", Operand::new(x, left(x))),
            ExprNode::Negate(x) => write!(f, "-{}", Operand::new(x, left(x))),
            ExprNode::And(a, b) => write!(
                f,
                "{} and {}",
                Operand::new(a, left(a)),
                Operand::new(b, right(b))
            ),
            ExprNode::Or(a, b) => write!(
                f,
                "{} or {}",
                Operand::new(a, left(a)),
                Operand::new(b, right(b))
            ),
            ExprNode::Compare(a, op, b) => write!(
                f,
                "{} {} {}",
                Operand::new(a, left(a)),
                op.keyword(),
                Operand::new(b, right(b))
            ),
            ExprNode::Arithmetic(a, op, b) => write!(
                f,
                "{} {} {}",
                Operand::new(a, left(a)),
                op.keyword(),
                Operand::new(b, right(b))
            ),
            ExprNode::In(a, list) => {
                write!(f, "{} in (", Operand::new(a, left(a)))?;
                write_list(f, list)?;
                f.write_str(")")
            }
            ExprNode::Function(func, args) => {
                write!(f, "{}(", func.name())?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// Ordering primitives

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// Apply the direction to an ascending comparison result.
    #[must_use]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderKey {
    pub path: PropertyPath,
    pub dir: SortDir,
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.dir {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        };
        write!(f, "{} {dir}", self.path)
    }
}
