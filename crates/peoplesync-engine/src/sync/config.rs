//! Sync configuration and validation.

use peoplesync_connector::config::{ConnectorSettings, SyncSetConfig};
use peoplesync_connector::person::{compound_key, AttributeKey};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::error::ConfigError;

/// Log verbosity requested by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Verbosity::Error),
            "warn" | "warning" => Ok(Verbosity::Warn),
            "info" => Ok(Verbosity::Info),
            "debug" => Ok(Verbosity::Debug),
            "trace" => Ok(Verbosity::Trace),
            _ => Err(format!("Unknown verbosity: {s}")),
        }
    }
}

/// Global runtime flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Compute and report change sets without applying them.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub verbosity: Verbosity,
}

/// One attribute mapping rule as written in configuration.
///
/// ```yaml
/// - source: givenName
///   destination: first_name
///   required: true
/// - source: title
///   destination: job_title
///   expression: "^$"
///   replace: "(none)"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    /// Attribute name on the source person.
    pub source: String,

    /// Attribute name written to the destination.
    pub destination: String,

    /// A missing value disables changes for the person.
    #[serde(default)]
    pub required: bool,

    /// Compare values of this attribute case-sensitively.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Regular expression applied to the source value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Replacement for every match of `expression`. `$1` style group
    /// references are expanded.
    #[serde(default)]
    pub replace: String,
}

impl AttributeMap {
    /// Create a simple one-to-one mapping.
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Set required flag.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set case-sensitive flag.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Set a regex substitution.
    #[must_use]
    pub fn with_expression(
        mut self,
        expression: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        self.expression = Some(expression.into());
        self.replace = replace.into();
        self
    }

    fn has_expression(&self) -> bool {
        self.expression.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// A validated mapping rule with its expression compiled.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub source: String,
    pub destination: String,
    pub required: bool,
    pub case_sensitive: bool,
    transform: Option<(Regex, String)>,
}

impl AttributeRule {
    fn compile(entry: &AttributeMap) -> Result<Self, ConfigError> {
        let transform = if entry.has_expression() {
            let expression = entry.expression.as_deref().unwrap_or_default();
            let re = Regex::new(expression).map_err(|e| ConfigError::InvalidExpression {
                destination: entry.destination.clone(),
                message: e.to_string(),
            })?;
            Some((re, entry.replace.clone()))
        } else {
            None
        };

        Ok(Self {
            source: entry.source.clone(),
            destination: entry.destination.clone(),
            required: entry.required,
            case_sensitive: entry.case_sensitive,
            transform,
        })
    }

    /// Whether a substitution is configured.
    #[must_use]
    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Apply the substitution, if any, to a source value.
    #[must_use]
    pub fn apply(&self, value: &str) -> String {
        match &self.transform {
            Some((re, replace)) => re.replace_all(value, replace.as_str()).into_owned(),
            None => value.to_string(),
        }
    }
}

/// Per-destination-attribute case sensitivity.
///
/// Repeated compound keys (`phone|work~1`) inherit the flag of their first
/// occurrence (`phone|work`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseSensitivity(HashMap<String, bool>);

impl CaseSensitivity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style flag setter.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, case_sensitive: bool) -> Self {
        self.0.insert(attribute.into(), case_sensitive);
        self
    }

    /// Whether values of `attribute` must match exactly.
    #[must_use]
    pub fn is_sensitive(&self, attribute: &str) -> bool {
        if let Some(flag) = self.0.get(attribute) {
            return *flag;
        }

        let key = AttributeKey::parse(attribute);
        match key.discriminator {
            Some(discriminator) if key.occurrence > 0 => self
                .0
                .get(&compound_key(key.prefix, discriminator, 0))
                .copied()
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl FromIterator<(String, bool)> for CaseSensitivity {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The attribute map after validation.
#[derive(Debug, Clone, Default)]
pub struct CompiledAttributeMap {
    rules: Vec<AttributeRule>,
}

impl CompiledAttributeMap {
    /// Validate and compile an attribute map.
    pub fn compile(entries: &[AttributeMap]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyAttributeMap);
        }

        let rules = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.source.trim().is_empty() {
                    return Err(ConfigError::EmptyAttributeName {
                        index,
                        field: "source",
                    });
                }
                if entry.destination.trim().is_empty() {
                    return Err(ConfigError::EmptyAttributeName {
                        index,
                        field: "destination",
                    });
                }
                AttributeRule::compile(entry)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    #[must_use]
    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }

    /// Source attribute names, in map order, without duplicates.
    #[must_use]
    pub fn source_attributes(&self) -> Vec<String> {
        unique(self.rules.iter().map(|r| r.source.as_str()))
    }

    /// Destination attribute names, in map order, without duplicates.
    #[must_use]
    pub fn destination_attributes(&self) -> Vec<String> {
        unique(self.rules.iter().map(|r| r.destination.as_str()))
    }

    /// Case sensitivity keyed by destination attribute.
    #[must_use]
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.rules
            .iter()
            .map(|r| (r.destination.clone(), r.case_sensitive))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn unique<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Everything the sync engine needs from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub source: ConnectorSettings,

    #[serde(default)]
    pub destination: ConnectorSettings,

    #[serde(default)]
    pub attribute_map: Vec<AttributeMap>,

    #[serde(default)]
    pub sync_sets: Vec<SyncSetConfig>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl SyncConfig {
    /// Validate the configuration and compile the attribute map.
    ///
    /// Runs before any connector is built, so nothing here touches the
    /// network.
    pub fn validate(&self) -> Result<CompiledAttributeMap, ConfigError> {
        if !self.source.has_kind() {
            return Err(ConfigError::MissingSourceType);
        }
        if !self.destination.has_kind() {
            return Err(ConfigError::MissingDestinationType);
        }

        let map = CompiledAttributeMap::compile(&self.attribute_map)?;

        if self.sync_sets.is_empty() {
            return Err(ConfigError::NoSyncSets);
        }

        let mut names = HashSet::new();
        for (index, set) in self.sync_sets.iter().enumerate() {
            if set.name.trim().is_empty() {
                return Err(ConfigError::UnnamedSyncSet { index });
            }
            if !names.insert(set.name.as_str()) {
                return Err(ConfigError::DuplicateSyncSet {
                    name: set.name.clone(),
                });
            }
        }

        Ok(map)
    }

    /// Sync sets that will actually run.
    pub fn enabled_sync_sets(&self) -> impl Iterator<Item = &SyncSetConfig> {
        self.sync_sets.iter().filter(|s| !s.disable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig {
            source: ConnectorSettings::new("rest"),
            destination: ConnectorSettings::new("rest"),
            attribute_map: vec![
                AttributeMap::new("mail", "email").required(),
                AttributeMap::new("givenName", "first_name"),
            ],
            sync_sets: vec![SyncSetConfig::new("staff")],
            runtime: RuntimeConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let map = config().validate().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.source_attributes(), vec!["mail", "givenName"]);
        assert_eq!(map.destination_attributes(), vec!["email", "first_name"]);
    }

    #[test]
    fn test_missing_types() {
        let mut cfg = config();
        cfg.source = ConnectorSettings::default();
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::MissingSourceType);

        let mut cfg = config();
        cfg.destination = ConnectorSettings::new("  ");
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::MissingDestinationType
        );
    }

    #[test]
    fn test_empty_attribute_map() {
        let mut cfg = config();
        cfg.attribute_map.clear();
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::EmptyAttributeMap);
    }

    #[test]
    fn test_invalid_expression() {
        let mut cfg = config();
        cfg.attribute_map
            .push(AttributeMap::new("title", "job_title").with_expression("([a-z", "x"));
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidExpression { ref destination, .. } if destination == "job_title"
        ));
    }

    #[test]
    fn test_empty_expression_is_no_transform() {
        let map =
            CompiledAttributeMap::compile(&[AttributeMap::new("a", "b").with_expression("", "x")])
                .unwrap();
        assert!(!map.rules()[0].has_transform());
        assert_eq!(map.rules()[0].apply("John"), "John");
    }

    #[test]
    fn test_sync_set_names() {
        let mut cfg = config();
        cfg.sync_sets.push(SyncSetConfig::new("staff"));
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::DuplicateSyncSet {
                name: "staff".to_string()
            }
        );

        let mut cfg = config();
        cfg.sync_sets.push(SyncSetConfig::new(""));
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::UnnamedSyncSet { index: 1 }
        );

        let mut cfg = config();
        cfg.sync_sets.clear();
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::NoSyncSets);
    }

    #[test]
    fn test_enabled_sync_sets() {
        let mut cfg = config();
        cfg.sync_sets.push(SyncSetConfig {
            disable: true,
            ..SyncSetConfig::new("contractors")
        });
        let names: Vec<_> = cfg.enabled_sync_sets().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["staff"]);
    }

    #[test]
    fn test_regex_replace_expands_groups() {
        let rule = CompiledAttributeMap::compile(&[
            AttributeMap::new("phone", "phone").with_expression(r"^\+1 (\d+)$", "0$1")
        ])
        .unwrap();
        assert_eq!(rule.rules()[0].apply("+1 5551234"), "05551234");
    }

    #[test]
    fn test_case_sensitivity_inherits_for_repeats() {
        let cs = CaseSensitivity::new()
            .with("phone|work", true)
            .with("name", false);
        assert!(cs.is_sensitive("phone|work"));
        assert!(cs.is_sensitive("phone|work~2"));
        assert!(!cs.is_sensitive("name"));
        assert!(!cs.is_sensitive("unknown"));
    }

    #[test]
    fn test_deserialize_yaml() {
        let yaml = r#"
source:
  type: rest
  base_url: https://hr.example.org
destination:
  type: rest
attribute_map:
  - source: mail
    destination: email
    required: true
  - source: title
    destination: job_title
    case_sensitive: true
    expression: ".*"
    replace: "(empty)"
sync_sets:
  - name: staff
    source:
      list_path: /staff
  - name: alumni
    disable: true
runtime:
  dry_run: true
  verbosity: debug
"#;
        let cfg: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.source.kind, "rest");
        assert!(cfg.runtime.dry_run);
        assert_eq!(cfg.runtime.verbosity, Verbosity::Debug);
        assert!(cfg.sync_sets[1].disable);
        assert_eq!(cfg.attribute_map[1].replace, "(empty)");

        let map = cfg.validate().unwrap();
        assert_eq!(map.rules()[1].apply("John"), "(empty)");
        assert!(map.case_sensitivity().is_sensitive("job_title"));
    }
}
