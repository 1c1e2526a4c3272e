//! Collection of per-parameter validation errors.

use crate::errors::QueryError;
use crate::problem::{ParameterViolation, Problem};

/// Receives errors found while initializing query options.
pub trait ValidationSink {
    fn add_error(&mut self, parameter: &str, error: QueryError);
}

/// Default sink: keeps errors in the order they were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<(String, QueryError)>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryError)> {
        self.errors.iter().map(|(p, e)| (p.as_str(), e))
    }

    /// Errors recorded against `parameter`.
    pub fn for_parameter<'a>(&'a self, parameter: &'a str) -> impl Iterator<Item = &'a QueryError> {
        self.errors
            .iter()
            .filter(move |(p, _)| p == parameter)
            .map(|(_, e)| e)
    }

    #[must_use]
    pub fn has_errors_for(&self, parameter: &str) -> bool {
        self.for_parameter(parameter).next().is_some()
    }

    /// 422 problem listing one violation per recorded error.
    #[must_use]
    pub fn to_problem(&self, instance: impl Into<String>) -> Problem {
        let violations = self
            .errors
            .iter()
            .map(|(parameter, error)| ParameterViolation {
                parameter: parameter.clone(),
                message: error.to_string(),
                code: error.code(),
            })
            .collect();
        Problem::invalid_query_options(instance.into(), violations)
    }
}

impl ValidationSink for ValidationErrors {
    fn add_error(&mut self, parameter: &str, error: QueryError) {
        self.errors.push((parameter.to_owned(), error));
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn groups_errors_by_parameter() {
        let mut errors = ValidationErrors::new();
        errors.add_error("$top", QueryError::range("$top must be non-negative"));
        errors.add_error("$select", QueryError::unknown_property("salary", "Person"));
        errors.add_error("$select", QueryError::unknown_property("bonus", "Person"));

        assert_eq!(errors.len(), 3);
        assert!(errors.has_errors_for("$top"));
        assert!(!errors.has_errors_for("$filter"));
        assert_eq!(errors.for_parameter("$select").count(), 2);
    }

    #[test]
    fn renders_unprocessable_entity_problem() {
        let mut errors = ValidationErrors::new();
        errors.add_error("$filter", QueryError::unknown_property("unknownField", "Person"));

        let problem = errors.to_problem("/people");
        assert_eq!(problem.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(problem.instance, "/people");

        let violations = &problem.errors;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].parameter, "$filter");
        assert_eq!(violations[0].code, "unknown_property");
        assert!(violations[0].message.contains("unknownField"));
    }
}
