use serde::{Deserialize, Serialize};

#[cfg(feature = "with-utoipa")]
use utoipa::IntoParams;

/// Raw query-string parameters as received from the transport.
///
/// A parameter that is absent or blank (whitespace only) is not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-utoipa", derive(IntoParams))]
#[cfg_attr(feature = "with-utoipa", into_params(parameter_in = Query))]
pub struct RawQueryParams {
    /// Comma-separated structural field names, or `*`.
    #[serde(rename = "$select", default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,

    /// Comma-separated navigation names with optional nested `($select=...;$expand=...)`.
    #[serde(rename = "$expand", default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,

    /// Boolean filter expression, e.g. `age gt 30 and contains(name,'a')`.
    #[serde(rename = "$filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Comma-separated `path [asc|desc]` keys.
    #[serde(rename = "$orderby", default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,

    /// Number of leading matches to skip.
    #[serde(rename = "$skip", default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,

    /// Maximum number of items to return.
    #[serde(rename = "$top", default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,

    /// `true` to include the total match count.
    #[serde(rename = "$count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
}

impl RawQueryParams {
    /// Decode a URL query string (without the leading `?`).
    ///
    /// Unrecognized keys are ignored.
    ///
    /// # Errors
    /// Returns the decoder error for malformed percent-encoding.
    pub fn from_query_string(query: &str) -> Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(query.strip_prefix('?').unwrap_or(query))
    }

    /// Value of the named parameter (`"$filter"`, ...), `None` when blank.
    #[must_use]
    pub fn get(&self, parameter: &str) -> Option<&str> {
        let raw = match parameter {
            "$select" => &self.select,
            "$expand" => &self.expand,
            "$filter" => &self.filter,
            "$orderby" => &self.orderby,
            "$skip" => &self.skip,
            "$top" => &self.top,
            "$count" => &self.count,
            _ => return None,
        };
        raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
