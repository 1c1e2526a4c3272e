//! Input limits that guard the parsers against abusive requests.
//!
//! Every exceeded limit surfaces as a [`QueryError::Range`] against the
//! parameter concerned.

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::errors::QueryError;

/// Configuration section read by [`QueryLimits::from_figment`].
pub const CONFIG_SECTION: &str = "odata_query";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryLimits {
    /// Maximum value for `$top`; `None` means unlimited.
    pub max_top: Option<u64>,
    pub max_orderby_fields: usize,
    /// Maximum length of `$filter` in characters.
    pub max_filter_length: usize,
    /// Maximum number of nodes in the parsed `$filter` tree.
    pub max_filter_nodes: usize,
    pub max_select_fields: usize,
    /// Maximum nesting of `$expand` options.
    pub max_expand_depth: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_top: None,
            max_orderby_fields: 5,
            max_filter_length: 2000,
            max_filter_nodes: 2000,
            max_select_fields: 100,
            max_expand_depth: 4,
        }
    }
}

impl QueryLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `odata_query` section of `figment`; defaults when absent.
    ///
    /// # Errors
    /// Returns the figment error when the section is malformed or has unknown keys.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        if figment.contains(CONFIG_SECTION) {
            figment.extract_inner(CONFIG_SECTION)
        } else {
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn with_max_top(mut self, max_top: u64) -> Self {
        self.max_top = Some(max_top);
        self
    }

    #[must_use]
    pub fn with_max_orderby_fields(mut self, max: usize) -> Self {
        self.max_orderby_fields = max;
        self
    }

    #[must_use]
    pub fn with_max_filter_length(mut self, max: usize) -> Self {
        self.max_filter_length = max;
        self
    }

    #[must_use]
    pub fn with_max_filter_nodes(mut self, max: usize) -> Self {
        self.max_filter_nodes = max;
        self
    }

    #[must_use]
    pub fn with_max_select_fields(mut self, max: usize) -> Self {
        self.max_select_fields = max;
        self
    }

    #[must_use]
    pub fn with_max_expand_depth(mut self, max: usize) -> Self {
        self.max_expand_depth = max;
        self
    }

    /// # Errors
    /// `QueryError::Range` when `top` exceeds `max_top`.
    pub fn validate_top(&self, top: u64) -> Result<(), QueryError> {
        match self.max_top {
            Some(max) if top > max => Err(QueryError::range(format!(
                "$top must not exceed {max}, got {top}"
            ))),
            _ => Ok(()),
        }
    }

    /// # Errors
    /// `QueryError::Range` when the expression is longer than `max_filter_length`.
    pub fn validate_filter_length(&self, filter: &str) -> Result<(), QueryError> {
        let len = filter.chars().count();
        if len > self.max_filter_length {
            return Err(QueryError::range(format!(
                "filter expression exceeds maximum length of {} characters",
                self.max_filter_length
            )));
        }
        Ok(())
    }

    /// # Errors
    /// `QueryError::Range` when the tree has more than `max_filter_nodes` nodes.
    pub fn validate_filter_nodes(&self, nodes: usize) -> Result<(), QueryError> {
        if nodes > self.max_filter_nodes {
            return Err(QueryError::range(format!(
                "filter expression has {nodes} nodes (max: {})",
                self.max_filter_nodes
            )));
        }
        Ok(())
    }

    /// # Errors
    /// `QueryError::Range` when more than `max_orderby_fields` keys are given.
    pub fn validate_orderby_count(&self, count: usize) -> Result<(), QueryError> {
        if count > self.max_orderby_fields {
            return Err(QueryError::range(format!(
                "too many orderby fields (max: {})",
                self.max_orderby_fields
            )));
        }
        Ok(())
    }

    /// # Errors
    /// `QueryError::Range` when more than `max_select_fields` names are given.
    pub fn validate_select_count(&self, count: usize) -> Result<(), QueryError> {
        if count > self.max_select_fields {
            return Err(QueryError::range(format!(
                "too many select fields (max: {})",
                self.max_select_fields
            )));
        }
        Ok(())
    }

    /// # Errors
    /// `QueryError::Range` when `$expand` nesting exceeds `max_expand_depth`.
    pub fn validate_expand_depth(&self, depth: usize) -> Result<(), QueryError> {
        if depth > self.max_expand_depth {
            return Err(QueryError::range(format!(
                "expand nesting exceeds {} levels",
                self.max_expand_depth
            )));
        }
        Ok(())
    }
}
