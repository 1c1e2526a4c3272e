//! Tokenizer for `$filter` and `$orderby` expressions.
//!
//! Keywords (`eq`, `and`, `asc`, ...) are lexed as identifiers; the parser
//! decides from position whether an identifier is an operator or a property.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::errors::QueryError;
use crate::value::{MAX_NUMBER_EXPONENT, Value, exponent_in_range};

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),
    /// Any literal other than `true`/`false`/`null`, which are identifiers.
    Literal(Value),
    OpenParen,
    CloseParen,
    Comma,
    Slash,
    Dot,
    Minus,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => f.write_str(s),
            Token::Literal(v) => write!(f, "{v}"),
            Token::OpenParen => f.write_str("("),
            Token::CloseParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Slash => f.write_str("/"),
            Token::Dot => f.write_str("."),
            Token::Minus => f.write_str("-"),
        }
    }
}

/// A token and the character offset it starts at.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    /// Byte offset into `input`.
    offset: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.offset..]
    }

    /// Character position (not byte offset) for error messages.
    fn char_position(&self) -> usize {
        self.input[..self.offset].chars().count()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, bytes: usize) -> &'a str {
        let taken = &self.input[self.offset..self.offset + bytes];
        self.offset += bytes;
        taken
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.offset = self.input.len() - trimmed.len();
    }

    fn scan(&mut self) -> Result<Option<Spanned>, QueryError> {
        self.skip_whitespace();
        let position = self.char_position();
        let Some(c) = self.peek_char() else {
            return Ok(None);
        };

        let token = match c {
            '(' => self.punct(Token::OpenParen),
            ')' => self.punct(Token::CloseParen),
            ',' => self.punct(Token::Comma),
            '/' => self.punct(Token::Slash),
            '.' => self.punct(Token::Dot),
            '-' => self.punct(Token::Minus),
            '\'' => self.scan_string(position)?,
            c if c.is_ascii_hexdigit() && guid_len(self.rest()).is_some() => self.scan_guid(),
            c if c.is_ascii_digit() => self.scan_numeric(position)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_ident(),
            c => {
                return Err(QueryError::parse(
                    position,
                    format!("unexpected character '{c}'"),
                ));
            }
        };
        Ok(Some(Spanned { token, position }))
    }

    fn punct(&mut self, token: Token) -> Token {
        self.bump(1);
        token
    }

    fn scan_ident(&mut self) -> Token {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        Token::Ident(self.bump(len).to_owned())
    }

    /// `'...'` with `''` as an escaped quote.
    fn scan_string(&mut self, position: usize) -> Result<Token, QueryError> {
        self.bump(1);
        let mut out = String::new();
        loop {
            let Some(c) = self.peek_char() else {
                return Err(QueryError::parse(position, "unterminated string literal"));
            };
            self.bump(c.len_utf8());
            if c == '\'' {
                if self.peek_char() == Some('\'') {
                    self.bump(1);
                    out.push('\'');
                } else {
                    return Ok(Token::Literal(Value::String(out)));
                }
            } else {
                out.push(c);
            }
        }
    }

    fn scan_guid(&mut self) -> Token {
        let len = guid_len(self.rest()).unwrap_or(0);
        let text = self.bump(len);
        // guid_len already validated the shape
        Uuid::parse_str(text).map_or_else(
            |_| Token::Ident(text.to_owned()),
            |u| Token::Literal(Value::Uuid(u)),
        )
    }

    /// Numbers, dates (`2024-01-31`), date-times (RFC 3339) and times (`10:30:00`).
    fn scan_numeric(&mut self, position: usize) -> Result<Token, QueryError> {
        let rest = self.rest();
        let bytes = rest.as_bytes();

        if is_date_prefix(bytes) {
            if bytes.get(10) == Some(&b'T') {
                let len = literal_len(rest);
                let text = self.bump(len);
                return DateTime::parse_from_rfc3339(text)
                    .map(|dt| Token::Literal(Value::DateTime(dt.with_timezone(&Utc))))
                    .map_err(|e| {
                        QueryError::parse(position, format!("invalid datetime '{text}': {e}"))
                    });
            }
            let text = self.bump(10);
            return NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| Token::Literal(Value::Date(d)))
                .map_err(|e| QueryError::parse(position, format!("invalid date '{text}': {e}")));
        }

        if bytes.len() >= 5 && bytes[2] == b':' && is_digits(&bytes[..2]) && is_digits(&bytes[3..5]) {
            let len = literal_len(rest);
            let text = self.bump(len);
            return NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                .map(|t| Token::Literal(Value::Time(t)))
                .map_err(|e| QueryError::parse(position, format!("invalid time '{text}': {e}")));
        }

        let len = number_len(bytes);
        let text = self.bump(len);
        if self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(QueryError::parse(position, format!("malformed number '{text}'")));
        }
        let n = BigDecimal::from_str(text)
            .map_err(|e| QueryError::parse(position, format!("invalid number '{text}': {e}")))?;
        if !exponent_in_range(&n) {
            return Err(QueryError::range(format!(
                "number '{text}' at position {position} exceeds the exponent limit of {MAX_NUMBER_EXPONENT}"
            )));
        }
        Ok(Token::Literal(Value::Number(n)))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan().transpose()
    }
}

fn is_digits(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_digit)
}

fn is_date_prefix(bytes: &[u8]) -> bool {
    bytes.len() >= 10
        && is_digits(&bytes[..4])
        && bytes[4] == b'-'
        && is_digits(&bytes[5..7])
        && bytes[7] == b'-'
        && is_digits(&bytes[8..10])
}

/// Length of a date/time literal: runs until whitespace or a delimiter.
fn literal_len(rest: &str) -> usize {
    rest.find(|c: char| c.is_whitespace() || matches!(c, ')' | ',' | '('))
        .unwrap_or(rest.len())
}

/// `digits [. digits] [(e|E) [+|-] digits]`
fn number_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = digits_from(0);
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end = digits_from(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            end = digits_from(exp);
        }
    }
    end
}

/// Length of a GUID at the start of `rest` (`8-4-4-4-12` hex digits), if any.
fn guid_len(rest: &str) -> Option<usize> {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let bytes = rest.as_bytes();
    let mut i = 0;
    for (n, group) in GROUPS.iter().enumerate() {
        if n > 0 {
            if bytes.get(i) != Some(&b'-') {
                return None;
            }
            i += 1;
        }
        let end = i + group;
        if bytes.len() < end || !bytes[i..end].iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        i = end;
    }
    match bytes.get(i) {
        Some(c) if c.is_ascii_alphanumeric() || *c == b'_' || *c == b'-' => None,
        _ => Some(i),
    }
}
