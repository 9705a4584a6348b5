//! Attribute filters used by sources to drop out-of-scope people.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};
use crate::person::Attributes;

/// A single filter as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Source attribute to test.
    pub attribute: String,
    /// Regular expression the attribute value must match.
    pub expression: String,
}

impl Filter {
    pub fn new(attribute: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            expression: expression.into(),
        }
    }
}

/// A compiled set of filters. All must match for a person to be in scope.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    compiled: Vec<(String, Regex)>,
}

impl Filters {
    /// Compile filters, failing on the first invalid expression.
    pub fn compile(filters: &[Filter]) -> ConnectorResult<Self> {
        let compiled = filters
            .iter()
            .map(|f| {
                Regex::new(&f.expression)
                    .map(|re| (f.attribute.clone(), re))
                    .map_err(|e| {
                        ConnectorError::invalid_configuration(format!(
                            "invalid filter expression for attribute '{}': {e}",
                            f.attribute
                        ))
                    })
            })
            .collect::<ConnectorResult<Vec<_>>>()?;

        Ok(Self { compiled })
    }

    /// True when every filter's attribute is present and matches.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.compiled.iter().all(|(attribute, re)| {
            attributes
                .get(attribute)
                .is_some_and(|value| re.is_match(value))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> Attributes {
        Attributes::new()
            .with("email", "jo@example.org")
            .with("department", "Finance")
    }

    #[test]
    fn test_empty_filters_match_everyone() {
        let filters = Filters::compile(&[]).unwrap();
        assert!(filters.is_empty());
        assert!(filters.matches(&Attributes::new()));
    }

    #[test]
    fn test_all_filters_must_match() {
        let filters = Filters::compile(&[
            Filter::new("email", "@example\\.org$"),
            Filter::new("department", "^Fin"),
        ])
        .unwrap();
        assert_eq!(filters.len(), 2);
        assert!(filters.matches(&staff()));

        let filters = Filters::compile(&[
            Filter::new("email", "@example\\.org$"),
            Filter::new("department", "^IT$"),
        ])
        .unwrap();
        assert!(!filters.matches(&staff()));
    }

    #[test]
    fn test_missing_attribute_does_not_match() {
        let filters = Filters::compile(&[Filter::new("title", ".*")]).unwrap();
        assert!(!filters.matches(&staff()));
    }

    #[test]
    fn test_invalid_expression_rejected() {
        let err = Filters::compile(&[Filter::new("email", "([a-z")]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("'email'"));
    }
}
