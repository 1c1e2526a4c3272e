//! Precedence-climbing parser for `$filter` and `$orderby`.
//!
//! Types are inferred while the tree is built: property paths are resolved
//! against the element type as soon as they are read and every operator node
//! is checked against its operand kinds by the [`Expr`] constructors.

use std::iter::Peekable;

use crate::ast::{ArithmeticOperator, CompareOperator, Expr, Function, OrderKey, SortDir};
use crate::errors::QueryError;
use crate::lexer::{Lexer, Spanned, Token};
use crate::schema::{ElementType, PropertyPath, TypeRegistry};
use crate::value::{Value, ValueKind};

/// Parenthesis/unary nesting allowed before the input is rejected.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Binding strength of operators; higher binds tighter.
type Precedence = u8;

const PREFIX_PRECEDENCE: Precedence = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PrefixOperator {
    Not,
    Minus,
}

impl PrefixOperator {
    fn into_expression(self, operand: Expr) -> Result<Expr, QueryError> {
        match self {
            PrefixOperator::Not => Expr::logical_not(operand),
            PrefixOperator::Minus => Expr::negate(operand),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InfixOperator {
    Or,
    And,
    Compare(CompareOperator),
    In,
    Arithmetic(ArithmeticOperator),
}

impl InfixOperator {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "or" => InfixOperator::Or,
            "and" => InfixOperator::And,
            "eq" => InfixOperator::Compare(CompareOperator::Eq),
            "ne" => InfixOperator::Compare(CompareOperator::Ne),
            "gt" => InfixOperator::Compare(CompareOperator::Gt),
            "ge" => InfixOperator::Compare(CompareOperator::Ge),
            "lt" => InfixOperator::Compare(CompareOperator::Lt),
            "le" => InfixOperator::Compare(CompareOperator::Le),
            "in" => InfixOperator::In,
            "add" => InfixOperator::Arithmetic(ArithmeticOperator::Add),
            "sub" => InfixOperator::Arithmetic(ArithmeticOperator::Sub),
            "mul" => InfixOperator::Arithmetic(ArithmeticOperator::Mul),
            "div" => InfixOperator::Arithmetic(ArithmeticOperator::Div),
            "mod" => InfixOperator::Arithmetic(ArithmeticOperator::Mod),
            _ => return None,
        })
    }

    fn precedence(self) -> Precedence {
        match self {
            InfixOperator::Or => 1,
            InfixOperator::And => 2,
            InfixOperator::Compare(op) if op.is_equality() => 3,
            InfixOperator::Compare(_) | InfixOperator::In => 4,
            InfixOperator::Arithmetic(ArithmeticOperator::Add | ArithmeticOperator::Sub) => 5,
            InfixOperator::Arithmetic(_) => 6,
        }
    }

    fn into_expression(self, lhs: Expr, rhs: Expr) -> Result<Expr, QueryError> {
        match self {
            InfixOperator::Or => Expr::or(lhs, rhs),
            InfixOperator::And => Expr::and(lhs, rhs),
            InfixOperator::Compare(op) => Expr::compare(lhs, op, rhs),
            InfixOperator::Arithmetic(op) => Expr::arithmetic(lhs, op, rhs),
            // `in` takes a list, handled by the caller
            InfixOperator::In => Err(QueryError::parse(0, "'in' requires a list")),
        }
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(word, "not" | "asc" | "desc") || InfixOperator::from_keyword(word).is_some()
}

struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    registry: &'a TypeRegistry,
    element_type: &'a ElementType,
    depth: usize,
    /// Character length of the input, reported for errors at end of input.
    end: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, registry: &'a TypeRegistry, element_type: &'a ElementType) -> Self {
        Self {
            lexer: Lexer::new(input).peekable(),
            registry,
            element_type,
            depth: 0,
            end: input.chars().count(),
        }
    }

    fn peek(&mut self) -> Result<Option<&Token>, QueryError> {
        match self.lexer.peek() {
            None => Ok(None),
            Some(Ok(spanned)) => Ok(Some(&spanned.token)),
            Some(Err(e)) => Err(e.clone()),
        }
    }

    fn next(&mut self) -> Result<Spanned, QueryError> {
        self.lexer
            .next()
            .transpose()?
            .ok_or_else(|| QueryError::parse(self.end, "unexpected end of input"))
    }

    fn next_if(&mut self, predicate: impl Fn(&Token) -> bool) -> Result<Option<Spanned>, QueryError> {
        if self.peek()?.is_some_and(predicate) {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    fn next_is(&mut self, token: &Token) -> Result<bool, QueryError> {
        Ok(self.next_if(|t| t == token)?.is_some())
    }

    fn next_keyword(&mut self, keyword: &str) -> Result<bool, QueryError> {
        Ok(self
            .next_if(|t| matches!(t, Token::Ident(w) if w == keyword))?
            .is_some())
    }

    fn expect(&mut self, expected: &Token) -> Result<(), QueryError> {
        let Spanned { token, position } = self.next()?;
        if &token == expected {
            Ok(())
        } else {
            Err(QueryError::parse(
                position,
                format!("expected '{expected}', found '{token}'"),
            ))
        }
    }

    fn expect_end(&mut self) -> Result<(), QueryError> {
        match self.lexer.next().transpose()? {
            None => Ok(()),
            Some(Spanned { token, position }) => {
                Err(QueryError::parse(position, format!("unexpected '{token}'")))
            }
        }
    }

    fn enter(&mut self) -> Result<(), QueryError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(QueryError::range(format!(
                "expression nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_expression(&mut self) -> Result<Expr, QueryError> {
        self.parse_expression_at(0)
    }

    /// Parse an expression whose infix operators bind at least as tightly as
    /// `min_precedence`.
    fn parse_expression_at(&mut self, min_precedence: Precedence) -> Result<Expr, QueryError> {
        self.enter()?;

        let mut lhs = if let Some(prefix) = self.parse_prefix_operator()? {
            let operand = self.parse_expression_at(PREFIX_PRECEDENCE)?;
            prefix.into_expression(operand)?
        } else {
            self.parse_expression_atom()?
        };

        while let Some(infix) = self.parse_infix_operator_at(min_precedence)? {
            lhs = if infix == InfixOperator::In {
                let items = self.parse_in_list()?;
                Expr::in_list(lhs, items)?
            } else {
                // left-associative: the right side must bind strictly tighter
                let rhs = self.parse_expression_at(infix.precedence() + 1)?;
                infix.into_expression(lhs, rhs)?
            };
        }

        self.leave();
        Ok(lhs)
    }

    fn parse_prefix_operator(&mut self) -> Result<Option<PrefixOperator>, QueryError> {
        if self.next_is(&Token::Minus)? {
            return Ok(Some(PrefixOperator::Minus));
        }
        if self.next_keyword("not")? {
            return Ok(Some(PrefixOperator::Not));
        }
        Ok(None)
    }

    fn parse_infix_operator_at(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<Option<InfixOperator>, QueryError> {
        let Some(Token::Ident(word)) = self.peek()? else {
            return Ok(None);
        };
        let Some(op) = InfixOperator::from_keyword(word) else {
            return Ok(None);
        };
        if op.precedence() < min_precedence {
            return Ok(None);
        }
        self.next()?;
        Ok(Some(op))
    }

    fn parse_expression_atom(&mut self) -> Result<Expr, QueryError> {
        let Spanned { token, position } = self.next()?;
        match token {
            Token::Literal(value) => Ok(Expr::literal(value)),
            Token::OpenParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::CloseParen)?;
                Ok(expr)
            }
            Token::Ident(word) => self.parse_identifier(word, position),
            other => Err(QueryError::parse(position, format!("unexpected '{other}'"))),
        }
    }

    /// Keyword literal, function call or property path.
    fn parse_identifier(&mut self, word: String, position: usize) -> Result<Expr, QueryError> {
        let literal = match word.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            "null" => Some(Value::Null),
            _ => None,
        };
        if let Some(value) = literal {
            return Ok(Expr::literal(value));
        }
        if is_reserved(&word) {
            return Err(QueryError::parse(position, format!("unexpected '{word}'")));
        }
        if self.peek()? == Some(&Token::OpenParen) {
            return self.parse_call(&word, position);
        }

        let path = self.parse_path_from(word)?;
        if path.kind() == ValueKind::Collection {
            return Err(QueryError::type_mismatch(format!(
                "collection navigation '{path}' cannot be used as an operand"
            )));
        }
        Ok(Expr::property(path))
    }

    fn parse_call(&mut self, name: &str, position: usize) -> Result<Expr, QueryError> {
        let function = Function::from_name(name)
            .ok_or_else(|| QueryError::parse(position, format!("unknown function '{name}'")))?;
        self.expect(&Token::OpenParen)?;

        let mut args = Vec::new();
        if !self.next_is(&Token::CloseParen)? {
            loop {
                args.push(self.parse_expression()?);
                if self.next_is(&Token::Comma)? {
                    continue;
                }
                self.expect(&Token::CloseParen)?;
                break;
            }
        }
        Expr::call(function, args)
    }

    fn parse_in_list(&mut self) -> Result<Vec<Expr>, QueryError> {
        self.expect(&Token::OpenParen)?;
        let mut items = vec![self.parse_expression()?];
        while self.next_is(&Token::Comma)? {
            items.push(self.parse_expression()?);
        }
        self.expect(&Token::CloseParen)?;
        Ok(items)
    }

    /// Continue a property path whose first segment has been consumed.
    fn parse_path_from(&mut self, first: String) -> Result<PropertyPath, QueryError> {
        let mut segments = vec![first];
        while self
            .next_if(|t| matches!(t, Token::Slash | Token::Dot))?
            .is_some()
        {
            let Spanned { token, position } = self.next()?;
            match token {
                Token::Ident(segment) => segments.push(segment),
                other => {
                    return Err(QueryError::parse(
                        position,
                        format!("expected property name, found '{other}'"),
                    ));
                }
            }
        }
        self.registry.resolve_path(self.element_type, &segments)
    }

    fn parse_order_key(&mut self) -> Result<OrderKey, QueryError> {
        let Spanned { token, position } = self.next()?;
        let first = match token {
            Token::Ident(word) if !is_reserved(&word) => word,
            other => {
                return Err(QueryError::parse(
                    position,
                    format!("expected property name, found '{other}'"),
                ));
            }
        };
        let path = self.parse_path_from(first)?;
        if !path.kind().is_scalar() {
            return Err(QueryError::type_mismatch(format!(
                "cannot order by navigation '{path}'"
            )));
        }

        let dir = if self.next_keyword("desc")? {
            SortDir::Desc
        } else {
            self.next_keyword("asc")?;
            SortDir::Asc
        };
        Ok(OrderKey { path, dir })
    }
}

/// Parse a `$filter` expression into a boolean-valued typed tree.
///
/// # Errors
/// Returns the first `QueryError` encountered.
pub fn parse_filter(
    input: &str,
    registry: &TypeRegistry,
    element_type: &ElementType,
) -> Result<Expr, QueryError> {
    let mut parser = Parser::new(input, registry, element_type);
    let expr = parser.parse_expression()?;
    parser.expect_end()?;
    if expr.kind() != ValueKind::Boolean {
        return Err(QueryError::type_mismatch(format!(
            "filter must be a boolean expression, found {}",
            expr.kind()
        )));
    }
    Ok(expr)
}

/// Parse a `$orderby` list: `path [asc|desc] (, path [asc|desc])*`.
///
/// # Errors
/// Returns the first `QueryError` encountered.
pub fn parse_orderby(
    input: &str,
    registry: &TypeRegistry,
    element_type: &ElementType,
) -> Result<Vec<OrderKey>, QueryError> {
    let mut parser = Parser::new(input, registry, element_type);
    let mut keys = vec![parser.parse_order_key()?];
    while parser.next_is(&Token::Comma)? {
        keys.push(parser.parse_order_key()?);
    }
    parser.expect_end()?;
    Ok(keys)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ast::ExprNode;
    use crate::value::FieldKind;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .element_type(
                ElementType::builder("Person")
                    .field("id", FieldKind::I64)
                    .field("name", FieldKind::String)
                    .nullable_field("age", FieldKind::I64)
                    .nullable_field("born", FieldKind::Date)
                    .field("active", FieldKind::Bool)
                    .navigation("manager", "Person")
                    .collection("reports", "Person"),
            )
            .build()
            .unwrap()
    }

    fn filter(input: &str) -> Result<Expr, QueryError> {
        let reg = registry();
        let person = reg.element_type("Person").unwrap();
        parse_filter(input, &reg, person)
    }

    fn orderby(input: &str) -> Result<Vec<OrderKey>, QueryError> {
        let reg = registry();
        let person = reg.element_type("Person").unwrap();
        parse_orderby(input, &reg, person)
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let e = filter("age gt 1 or age lt 0 and name eq 'x'").unwrap();
        assert!(matches!(e.node(), ExprNode::Or(..)));
        assert_eq!(e.to_string(), "age gt 1 or age lt 0 and name eq 'x'");
    }

    #[test]
    fn parentheses_override_precedence() {
        let e = filter("(age gt 1 or age lt 0) and active").unwrap();
        assert!(matches!(e.node(), ExprNode::And(..)));
        assert_eq!(e.to_string(), "(age gt 1 or age lt 0) and active");
    }

    #[test]
    fn not_binds_tightest() {
        let e = filter("not active and active").unwrap();
        let ExprNode::And(lhs, _) = e.node() else {
            panic!("expected and, got {e}");
        };
        assert!(matches!(lhs.node(), ExprNode::Not(_)));
        assert!(matches!(filter("not age gt 1"), Err(QueryError::TypeMismatch(_))));
    }

    #[test]
    fn arithmetic_is_left_associative() {
        let e = filter("age sub 1 sub 2 eq 3").unwrap();
        assert_eq!(e.to_string(), "age sub 1 sub 2 eq 3");
        let e = filter("age sub (1 sub 2) eq 3").unwrap();
        assert_eq!(e.to_string(), "age sub (1 sub 2) eq 3");
        let e = filter("age add 2 mul 3 gt -4").unwrap();
        assert_eq!(e.to_string(), "age add 2 mul 3 gt -4");
    }

    #[test]
    fn paths_accept_slash_and_dot() {
        let a = filter("manager/name eq 'x'").unwrap();
        let b = filter("manager.name eq 'x'").unwrap();
        assert_eq!(a, b);
        assert!(filter("manager eq null").is_ok());
    }

    #[test]
    fn functions_and_in() {
        assert!(filter("contains(name,'an') and startswith(tolower(name),'a')").is_ok());
        assert!(filter("year(born) eq 1990").is_ok());
        assert!(filter("name in ('Ann','Bo',null)").is_ok());
        assert!(matches!(filter("name in (1, 2)"), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(filter("frobnicate(name)"), Err(QueryError::Parse { .. })));
    }

    #[test]
    fn unknown_property_is_reported() {
        assert_eq!(
            filter("unknownField eq 1").unwrap_err(),
            QueryError::UnknownProperty {
                name: "unknownField".to_owned(),
                element_type: "Person".to_owned(),
            }
        );
    }

    #[test]
    fn type_errors() {
        assert!(matches!(filter("age eq 'x'"), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(filter("name"), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(filter("reports eq null"), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(filter("active gt false"), Err(QueryError::TypeMismatch(_))));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        assert!(matches!(
            filter("age gt"),
            Err(QueryError::Parse { position: 6, .. })
        ));
        assert!(matches!(
            filter("age gt 1)"),
            Err(QueryError::Parse { position: 8, .. })
        ));
        assert!(matches!(
            filter("(age gt 1"),
            Err(QueryError::Parse { .. })
        ));
        assert!(matches!(filter("age eq and"), Err(QueryError::Parse { .. })));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let deep = format!("{}active{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(filter(&deep), Err(QueryError::Range(_))));
        let ok = format!("{}active{}", "(".repeat(10), ")".repeat(10));
        assert!(filter(&ok).is_ok());
    }

    #[test]
    fn orderby_keys() {
        let keys = orderby("name, age desc, manager/id asc").unwrap();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["name asc", "age desc", "manager/id asc"]);
    }

    #[test]
    fn orderby_errors() {
        assert!(matches!(orderby("manager"), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(orderby("salary"), Err(QueryError::UnknownProperty { .. })));
        assert!(matches!(orderby("name sideways"), Err(QueryError::Parse { .. })));
        assert!(matches!(orderby("name,"), Err(QueryError::Parse { .. })));
    }
}
