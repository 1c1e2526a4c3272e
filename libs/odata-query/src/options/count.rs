use crate::errors::QueryError;
use crate::query::RawQueryParams;
use crate::validation::ValidationSink;

use super::{ParseContext, QueryOption, reject};

/// `$count`: a flag asking for the total number of matches.
///
/// It never transforms the source; the query set reads it to decide whether
/// to count before paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountOption {
    value: Option<bool>,
}

impl CountOption {
    pub const PARAMETER: &'static str = "$count";

    /// Whether `$count=true` was given.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.value == Some(true)
    }
}

impl QueryOption for CountOption {
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
        if raw.eq_ignore_ascii_case("true") {
            self.value = Some(true);
        } else if raw.eq_ignore_ascii_case("false") {
            self.value = Some(false);
        } else {
            reject(
                sink,
                Self::PARAMETER,
                QueryError::range(format!("$count must be true or false, got '{raw}'")),
            );
        }
    }

    fn is_active(&self) -> bool {
        self.value.is_some()
    }
}
