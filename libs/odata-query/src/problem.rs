//! RFC 9457 problem body for rejected query parameters.

use http::StatusCode;
use serde::{Serialize, Serializer};

const PROBLEM_TYPE: &str = "about:blank";
const TITLE: &str = "Invalid Query Options";
const CODE: &str = "invalid_query_options";

#[allow(clippy::trivially_copy_pass_by_ref)] // serialize_with passes &T
fn status_as_u16<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

/// 422 response body listing every rejected query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    pub title: &'static str,
    #[serde(serialize_with = "status_as_u16")]
    pub status: StatusCode,
    pub detail: String,
    /// Request path the query was sent to.
    pub instance: String,
    pub code: &'static str,
    pub errors: Vec<ParameterViolation>,
}

/// One error recorded against a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterViolation {
    /// Parameter name, e.g. `$filter`; serialized as `field`.
    #[serde(rename = "field")]
    pub parameter: String,
    pub message: String,
    /// Stable error code, see [`QueryError::code`](crate::QueryError::code).
    pub code: &'static str,
}

impl Problem {
    pub(crate) fn invalid_query_options(
        instance: String,
        errors: Vec<ParameterViolation>,
    ) -> Self {
        Self {
            problem_type: PROBLEM_TYPE,
            title: TITLE,
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: format!("{} query parameter error(s)", errors.len()),
            instance,
            code: CODE,
            errors,
        }
    }
}
