use crate::errors::QueryError;
use crate::query::RawQueryParams;
use crate::source::Queryable;
use crate::validation::ValidationSink;

use super::{ParseContext, QueryOption, reject};

/// Parse a non-negative integer parameter.
///
/// Anything that is not an integer is a parse error; a negative integer is a
/// range error. A leading `+` is not part of the integer grammar.
fn parse_non_negative(parameter: &str, raw: &str) -> Result<u64, QueryError> {
    let not_integer =
        || QueryError::parse(0, format!("{parameter} must be an integer, got '{raw}'"));
    if raw.starts_with('+') {
        return Err(not_integer());
    }
    let n: i128 = raw.parse().map_err(|_| not_integer())?;
    if n < 0 {
        return Err(QueryError::range(format!(
            "{parameter} must not be negative, got {n}"
        )));
    }
    u64::try_from(n).map_err(|_| QueryError::range(format!("{parameter} is too large: {n}")))
}

/// `$skip`: drop that many leading items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipOption {
    value: Option<u64>,
}

impl SkipOption {
    pub const PARAMETER: &'static str = "$skip";

    #[must_use]
    pub fn value(&self) -> Option<u64> {
        self.value
    }
}

impl QueryOption for SkipOption {
    const PARAMETERS: &'static [&'static str] = &[Self::PARAMETER];

    fn initialize(
        &mut self,
        params: &RawQueryParams,
        _ctx: &ParseContext<'_>,
        sink: &mut dyn ValidationSink,
    ) {
        self.value = None;
        let Some(raw) = params.get(Self::PARAMETER) else {
            return;
        };
        match parse_non_negative(Self::PARAMETER, raw) {
            Ok(n) => self.value = Some(n),
            Err(e) => reject(sink, Self::PARAMETER, e),
        }
    }

    fn is_active(&self) -> bool {
        self.value.is_some()
    }

    fn apply<T, Q: Queryable<T>>(&self, source: Q) -> Q {
        match self.value {
            Some(n) => source.skip(n),
            None => source,
        }
    }
}

/// `$top`: keep at most that many items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopOption {
    value: Option<u64>,
}

impl TopOption {
    pub const PARAMETER: &'static str = "$top";

    #[must_use]
    pub fn value(&self) -> Option<u64> {
        self.value
    }
}

impl QueryOption for TopOption {
    const PARAMETERS: &'static [&'static str] = &[Self::PARAMETER];

    fn initialize(
        &mut self,
        params: &RawQueryParams,
        ctx: &ParseContext<'_>,
        sink: &mut dyn ValidationSink,
    ) {
        self.value = None;
        let Some(raw) = params.get(Self::PARAMETER) else {
            return;
        };
        let parsed = parse_non_negative(Self::PARAMETER, raw)
            .and_then(|n| ctx.limits.validate_top(n).map(|()| n));
        match parsed {
            Ok(n) => self.value = Some(n),
            Err(e) => reject(sink, Self::PARAMETER, e),
        }
    }

    fn is_active(&self) -> bool {
        self.value.is_some()
    }

    fn apply<T, Q: Queryable<T>>(&self, source: Q) -> Q {
        match self.value {
            Some(n) => source.take(n),
            None => source,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_non_negative_integers() {
        assert_eq!(parse_non_negative("$skip", "0"), Ok(0));
        assert_eq!(parse_non_negative("$skip", "42"), Ok(42));
        assert!(matches!(
            parse_non_negative("$skip", "-1"),
            Err(QueryError::Range(_))
        ));
        assert!(matches!(
            parse_non_negative("$top", "abc"),
            Err(QueryError::Parse { .. })
        ));
        assert!(matches!(
            parse_non_negative("$top", "1.5"),
            Err(QueryError::Parse { .. })
        ));
        assert!(matches!(
            parse_non_negative("$top", "+5"),
            Err(QueryError::Parse { .. })
        ));
        assert!(matches!(
            parse_non_negative("$skip", "+0"),
            Err(QueryError::Parse { .. })
        ));
        assert!(matches!(
            parse_non_negative("$top", "99999999999999999999999"),
            Err(QueryError::Range(_))
        ));
    }
}
