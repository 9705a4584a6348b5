//! Attribute equality between a source person and a destination person.
//!
//! The comparison is one-directional: only keys present on the source person
//! are inspected. Destination-only attributes are ignored because the
//! attribute map decides which attributes take part in a sync.

use peoplesync_connector::person::Person;
use serde::Serialize;

use super::config::CaseSensitivity;

/// One attribute whose values differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDifference {
    pub attribute: String,
    pub source: String,
    pub destination: String,
}

/// Compares people using per-attribute case sensitivity.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    case_sensitivity: CaseSensitivity,
}

impl Comparator {
    #[must_use]
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self { case_sensitivity }
    }

    /// True when every source attribute matches its destination counterpart.
    ///
    /// A key missing on the destination compares as the empty string.
    #[must_use]
    pub fn equal(&self, source: &Person, destination: &Person) -> bool {
        source
            .attributes
            .iter()
            .all(|(key, value)| self.values_match(key, value, destination))
    }

    /// Every mismatching source attribute, in key order.
    #[must_use]
    pub fn differences(&self, source: &Person, destination: &Person) -> Vec<AttributeDifference> {
        source
            .attributes
            .iter()
            .filter(|(key, value)| !self.values_match(key, value, destination))
            .map(|(key, value)| AttributeDifference {
                attribute: key.clone(),
                source: value.clone(),
                destination: destination.attributes.get_or_empty(key).to_string(),
            })
            .collect()
    }

    fn values_match(&self, key: &str, value: &str, destination: &Person) -> bool {
        let other = destination.attributes.get_or_empty(key);
        if self.case_sensitivity.is_sensitive(key) {
            value == other
        } else {
            value.to_lowercase() == other.to_lowercase()
        }
    }
}

/// Compare two people with the given case sensitivity.
#[must_use]
pub fn equal(source: &Person, destination: &Person, case_sensitivity: &CaseSensitivity) -> bool {
    Comparator::new(case_sensitivity.clone()).equal(source, destination)
}
