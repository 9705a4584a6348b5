//! People, attribute bags and change sets.
//!
//! A [`Person`] is an open attribute bag keyed by destination attribute names.
//! Repeated sub-records from hierarchical sources (several phone numbers,
//! several addresses) are stored under compound keys so none are lost:
//!
//! ```text
//! phone|work      first work phone
//! phone|work~1    second work phone
//! phone|mobile    first mobile phone
//! ```

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Separates the prefix of a compound key from its discriminator.
pub const KEY_DELIMITER: char = '|';

/// Separates a discriminator from the occurrence index of a repeated entry.
pub const OCCURRENCE_DELIMITER: char = '~';

/// Parsed form of an attribute key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeKey<'a> {
    /// Part before the delimiter, or the whole key for simple names.
    pub prefix: &'a str,
    /// Part after the delimiter, without the occurrence suffix.
    pub discriminator: Option<&'a str>,
    /// 0 for the first occurrence, `n` for a `~n` suffix.
    pub occurrence: usize,
}

impl<'a> AttributeKey<'a> {
    /// Parse a stored key.
    ///
    /// A `~n` suffix is only treated as an occurrence index when `n` parses
    /// as a number; `phone|work~home` keeps `work~home` as its discriminator.
    #[must_use]
    pub fn parse(key: &'a str) -> Self {
        let Some((prefix, rest)) = key.split_once(KEY_DELIMITER) else {
            return Self {
                prefix: key,
                discriminator: None,
                occurrence: 0,
            };
        };

        if let Some((discriminator, index)) = rest.rsplit_once(OCCURRENCE_DELIMITER) {
            if let Ok(occurrence) = index.parse::<usize>() {
                return Self {
                    prefix,
                    discriminator: Some(discriminator),
                    occurrence,
                };
            }
        }

        Self {
            prefix,
            discriminator: Some(rest),
            occurrence: 0,
        }
    }

    /// Whether this is a compound `prefix|discriminator` key.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.discriminator.is_some()
    }
}

/// Build the compound key for the given prefix, discriminator and occurrence.
#[must_use]
pub fn compound_key(prefix: &str, discriminator: &str, occurrence: usize) -> String {
    if occurrence == 0 {
        format!("{prefix}{KEY_DELIMITER}{discriminator}")
    } else {
        format!("{prefix}{KEY_DELIMITER}{discriminator}{OCCURRENCE_DELIMITER}{occurrence}")
    }
}

/// Flat key/value bag of a person's attributes.
///
/// Ordered so that logs and serialized output are stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Insert a repeated sub-record value without overwriting earlier ones.
    ///
    /// Returns the key the value was stored under.
    pub fn insert_repeated(
        &mut self,
        prefix: &str,
        discriminator: &str,
        value: impl Into<String>,
    ) -> String {
        let mut occurrence = 0;
        let key = loop {
            let candidate = compound_key(prefix, discriminator, occurrence);
            if !self.0.contains_key(&candidate) {
                break candidate;
            }
            occurrence += 1;
        };
        self.0.insert(key.clone(), value.into());
        key
    }

    /// Get a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get a value, treating a missing key as the empty string.
    #[must_use]
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Iterate keys in order.
    pub fn keys(&self) -> btree_map::Keys<'_, String, String> {
        self.0.keys()
    }

    /// All entries sharing a compound-key prefix, in key order.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.0
            .iter()
            .filter(move |(k, _)| AttributeKey::parse(k).prefix == prefix)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Attributes {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One individual as seen by either side of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Join key between source and destination, compared case-insensitively.
    pub compare_value: String,

    /// Destination-assigned identifier, set once a destination record matched.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Attribute bag.
    #[serde(default)]
    pub attributes: Attributes,

    /// Set when a required attribute was missing; such people are never
    /// created or updated.
    #[serde(default)]
    pub disable_changes: bool,
}

impl Person {
    /// Create a person with an empty attribute bag.
    pub fn new(compare_value: impl Into<String>) -> Self {
        Self {
            compare_value: compare_value.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Builder-style id setter.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// The normalized join key.
    #[must_use]
    pub fn compare_key(&self) -> String {
        self.compare_value.to_lowercase()
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compare_value)
    }
}

/// The three-way partition produced by diffing a source against a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub create: Vec<Person>,
    pub update: Vec<Person>,
    pub delete: Vec<Person>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of planned operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts of successfully applied changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeResults {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl ChangeResults {
    /// Total successful operations.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.created + self.updated + self.deleted
    }
}

impl fmt::Display for ChangeResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={}",
            self.created, self.updated, self.deleted
        )
    }
}

/// Lock-free counters incremented by concurrent apply workers.
#[derive(Debug, Default)]
pub struct ChangeCounters {
    created: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
}

impl ChangeCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot current values.
    #[must_use]
    pub fn snapshot(&self) -> ChangeResults {
        ChangeResults {
            created: self.created.load(Ordering::SeqCst),
            updated: self.updated.load(Ordering::SeqCst),
            deleted: self.deleted.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_parse_simple_key() {
        let key = AttributeKey::parse("email");
        assert_eq!(key.prefix, "email");
        assert_eq!(key.discriminator, None);
        assert_eq!(key.occurrence, 0);
        assert!(!key.is_compound());
    }

    #[test]
    fn test_parse_compound_keys() {
        let key = AttributeKey::parse("phone|work");
        assert_eq!(key.prefix, "phone");
        assert_eq!(key.discriminator, Some("work"));
        assert_eq!(key.occurrence, 0);

        let key = AttributeKey::parse("phone|work~2");
        assert_eq!(key.discriminator, Some("work"));
        assert_eq!(key.occurrence, 2);

        let key = AttributeKey::parse("phone|work~home");
        assert_eq!(key.discriminator, Some("work~home"));
        assert_eq!(key.occurrence, 0);
    }

    #[test]
    fn test_insert_repeated_never_overwrites() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.insert_repeated("phone", "work", "111"), "phone|work");
        assert_eq!(attrs.insert_repeated("phone", "work", "222"), "phone|work~1");
        assert_eq!(attrs.insert_repeated("phone", "mobile", "333"), "phone|mobile");
        assert_eq!(attrs.insert_repeated("phone", "work", "444"), "phone|work~2");

        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.get("phone|work"), Some("111"));
        assert_eq!(attrs.get("phone|work~1"), Some("222"));
        assert_eq!(attrs.get("phone|work~2"), Some("444"));
        assert_eq!(attrs.with_prefix("phone").count(), 4);
    }

    #[test]
    fn test_get_or_empty() {
        let attrs = Attributes::new().with("name", "Jo");
        assert_eq!(attrs.get_or_empty("name"), "Jo");
        assert_eq!(attrs.get_or_empty("title"), "");
    }

    #[test]
    fn test_person_serialization_shape() {
        let person = Person::new("jo@example.org").with_attribute("name", "Jo");
        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json["compare_value"], "jo@example.org");
        assert_eq!(json["attributes"]["name"], "Jo");
        assert!(json.get("id").is_none());
        assert_eq!(json["disable_changes"], false);
    }

    #[test]
    fn test_change_set_len() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());
        changes.create.push(Person::new("a"));
        changes.delete.push(Person::new("b"));
        assert_eq!(changes.len(), 2);
    }

    #[tokio::test]
    async fn test_counters_from_many_tasks() {
        let counters = Arc::new(ChangeCounters::new());
        let mut handles = Vec::new();
        for i in 0..30 {
            let counters = Arc::clone(&counters);
            handles.push(tokio::spawn(async move {
                match i % 3 {
                    0 => counters.record_created(),
                    1 => counters.record_updated(),
                    _ => counters.record_deleted(),
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let results = counters.snapshot();
        assert_eq!(results.created, 10);
        assert_eq!(results.updated, 10);
        assert_eq!(results.deleted, 10);
        assert_eq!(results.total(), 30);
        assert_eq!(results.to_string(), "created=10 updated=10 deleted=10");
    }
}
