//! `$select` and `$expand`.
//!
//! `$expand` accepts nested options in parentheses separated by `;`:
//!
//! ```text
//! $expand=manager,reports($select=name,age;$expand=department)
//! ```
//!
//! Syntax errors make the whole `$expand` inactive. Unknown or misplaced
//! names are reported and dropped while the remaining names still apply.

use crate::errors::QueryError;
use crate::parser::MAX_NESTING_DEPTH;
use crate::projection::Projection;
use crate::query::RawQueryParams;
use crate::schema::{ElementType, TypeRegistry, is_identifier};
use crate::source::Queryable;
use crate::validation::ValidationSink;

use super::{ParseContext, QueryOption, reject};

/// Validated `$select` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// `*`: every structural field.
    All,
    Fields(Vec<String>),
}

/// One validated `$expand` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandItem {
    pub navigation: String,
    pub select: Option<Selection>,
    pub expand: Vec<ExpandItem>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectExpandOption {
    select: Option<Selection>,
    expand: Vec<ExpandItem>,
    projection: Projection,
}

impl SelectExpandOption {
    pub const SELECT: &'static str = "$select";
    pub const EXPAND: &'static str = "$expand";

    #[must_use]
    pub fn select(&self) -> Option<&Selection> {
        self.select.as_ref()
    }

    #[must_use]
    pub fn expand(&self) -> &[ExpandItem] {
        &self.expand
    }

    /// Projection applied to each item when the result is encoded.
    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Every expanded navigation path, nested paths flattened with `/`.
    #[must_use]
    pub fn include_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(&self.expand, "", &mut paths);
        paths
    }
}

fn collect_paths(items: &[ExpandItem], prefix: &str, out: &mut Vec<String>) {
    for item in items {
        let path = if prefix.is_empty() {
            item.navigation.clone()
        } else {
            format!("{prefix}/{}", item.navigation)
        };
        out.push(path.clone());
        collect_paths(&item.expand, &path, out);
    }
}

impl QueryOption for SelectExpandOption {
    const PARAMETERS: &'static [&'static str] = &[Self::SELECT, Self::EXPAND];

    fn initialize(
        &mut self,
        params: &RawQueryParams,
        ctx: &ParseContext<'_>,
        sink: &mut dyn ValidationSink,
    ) {
        self.select = params
            .get(Self::SELECT)
            .and_then(|raw| resolve_select(raw, ctx.element_type, ctx, sink, Self::SELECT));

        self.expand = match params.get(Self::EXPAND) {
            None => Vec::new(),
            Some(raw) => match parse_expand_syntax(raw) {
                Ok(items) => match ctx.limits.validate_expand_depth(depth(&items)) {
                    Ok(()) => resolve_expand(&items, ctx.element_type, ctx, sink),
                    Err(e) => {
                        reject(sink, Self::EXPAND, e);
                        Vec::new()
                    }
                },
                Err(e) => {
                    reject(sink, Self::EXPAND, e);
                    Vec::new()
                }
            },
        };

        self.projection = build_projection(
            ctx.registry,
            ctx.element_type,
            self.select.as_ref(),
            &self.expand,
        );
    }

    fn is_active(&self) -> bool {
        self.select.is_some() || !self.expand.is_empty()
    }

    fn apply<T, Q: Queryable<T>>(&self, source: Q) -> Q {
        self.include_paths()
            .iter()
            .fold(source, |source, path| source.include(path))
    }
}

/// Validate a comma-separated field list; `None` when no valid name remains.
fn resolve_select(
    raw: &str,
    element_type: &ElementType,
    ctx: &ParseContext<'_>,
    sink: &mut dyn ValidationSink,
    parameter: &str,
) -> Option<Selection> {
    let names: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if let Err(e) = ctx.limits.validate_select_count(names.len()) {
        reject(sink, parameter, e);
        return None;
    }

    let mut all = false;
    let mut fields: Vec<String> = Vec::new();
    for name in names {
        if name == "*" {
            all = true;
            continue;
        }
        match element_type.field(name) {
            None => reject(
                sink,
                parameter,
                QueryError::unknown_property(name, element_type.name()),
            ),
            Some(field) if field.is_navigation() => reject(
                sink,
                parameter,
                QueryError::type_mismatch(format!(
                    "'{name}' is a navigation property and cannot be selected; use $expand"
                )),
            ),
            Some(_) => {
                if !fields.iter().any(|f| f == name) {
                    fields.push(name.to_owned());
                }
            }
        }
    }

    if all {
        Some(Selection::All)
    } else if fields.is_empty() {
        None
    } else {
        Some(Selection::Fields(fields))
    }
}

fn resolve_expand(
    items: &[RawExpandItem],
    element_type: &ElementType,
    ctx: &ParseContext<'_>,
    sink: &mut dyn ValidationSink,
) -> Vec<ExpandItem> {
    let parameter = SelectExpandOption::EXPAND;
    let mut resolved: Vec<ExpandItem> = Vec::new();
    for raw in items {
        let Some((_, target)) = ctx.registry.resolve_navigation(element_type, &raw.name) else {
            let error = if element_type.field(&raw.name).is_some() {
                QueryError::type_mismatch(format!(
                    "'{}' is not a navigation property",
                    raw.name
                ))
            } else {
                QueryError::unknown_property(&raw.name, element_type.name())
            };
            reject(sink, parameter, error);
            continue;
        };
        if resolved.iter().any(|item| item.navigation == raw.name) {
            continue;
        }
        resolved.push(ExpandItem {
            navigation: raw.name.clone(),
            select: raw
                .select
                .as_deref()
                .and_then(|s| resolve_select(s, target, ctx, sink, parameter)),
            expand: resolve_expand(&raw.expand, target, ctx, sink),
        });
    }
    resolved
}

fn build_projection(
    registry: &TypeRegistry,
    element_type: &ElementType,
    select: Option<&Selection>,
    expand: &[ExpandItem],
) -> Projection {
    let select = select.map(|selection| match selection {
        Selection::All => element_type
            .structural_fields()
            .map(|f| f.name().to_owned())
            .collect(),
        Selection::Fields(fields) => fields.clone(),
    });
    let navigations = element_type
        .fields()
        .iter()
        .filter(|f| f.is_navigation())
        .map(|f| f.name().to_owned())
        .collect();
    let expand = expand
        .iter()
        .filter_map(|item| {
            let (_, target) = registry.resolve_navigation(element_type, &item.navigation)?;
            let nested = build_projection(registry, target, item.select.as_ref(), &item.expand);
            Some((item.navigation.clone(), nested))
        })
        .collect();
    Projection::new(select, navigations, expand)
}

// Syntax

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawExpandItem {
    name: String,
    select: Option<String>,
    expand: Vec<RawExpandItem>,
}

fn depth(items: &[RawExpandItem]) -> usize {
    items
        .iter()
        .map(|item| 1 + depth(&item.expand))
        .max()
        .unwrap_or(0)
}

fn parse_expand_syntax(input: &str) -> Result<Vec<RawExpandItem>, QueryError> {
    let mut parser = ExpandSyntax { input, pos: 0 };
    let items = parser.list(1)?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected '{c}'")));
    }
    Ok(items)
}

struct ExpandSyntax<'a> {
    input: &'a str,
    /// Byte offset.
    pos: usize,
}

impl<'a> ExpandSyntax<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::parse(self.input[..self.pos].chars().count(), message)
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let len = self.rest().find(|c: char| !pred(c)).unwrap_or(self.rest().len());
        self.pos += len;
        &self.input[start..self.pos]
    }

    fn list(&mut self, level: usize) -> Result<Vec<RawExpandItem>, QueryError> {
        if level > MAX_NESTING_DEPTH {
            return Err(QueryError::range(format!(
                "$expand nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        let mut items = vec![self.item(level)?];
        while self.eat(',') {
            items.push(self.item(level)?);
        }
        Ok(items)
    }

    fn item(&mut self, level: usize) -> Result<RawExpandItem, QueryError> {
        self.skip_whitespace();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_identifier(name) {
            return Err(self.error("expected navigation property name"));
        }
        let mut item = RawExpandItem {
            name: name.to_owned(),
            select: None,
            expand: Vec::new(),
        };

        if self.eat('(') {
            loop {
                self.nested_option(&mut item, level)?;
                if self.eat(';') {
                    continue;
                }
                if self.eat(')') {
                    break;
                }
                return Err(self.error("expected ';' or ')'"));
            }
        }
        Ok(item)
    }

    fn nested_option(&mut self, item: &mut RawExpandItem, level: usize) -> Result<(), QueryError> {
        if self.eat_str("$select=") {
            let text = self.take_while(|c| c != ';' && c != ')');
            item.select = Some(text.trim().to_owned());
            Ok(())
        } else if self.eat_str("$expand=") {
            item.expand = self.list(level + 1)?;
            Ok(())
        } else {
            Err(self.error("expected nested $select or $expand"))
        }
    }
}
