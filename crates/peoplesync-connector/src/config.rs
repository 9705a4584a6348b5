//! Connector configuration types.
//!
//! Connector settings are tagged by a `type` string and otherwise opaque to
//! the core; each adapter deserializes the remaining options into its own
//! typed configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConnectorError, ConnectorResult};

/// Global settings for one side of the sync.
///
/// ```yaml
/// source:
///   type: rest
///   base_url: https://hr.example.org/api
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// Registry key of the adapter to build.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Adapter-specific options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ConnectorSettings {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: Map::new(),
        }
    }

    /// Builder-style option setter.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Whether a connector type was configured.
    #[must_use]
    pub fn has_kind(&self) -> bool {
        !self.kind.trim().is_empty()
    }

    /// Deserialize the options into an adapter's typed configuration.
    pub fn parse<T: DeserializeOwned>(&self) -> ConnectorResult<T> {
        serde_json::from_value(Value::Object(self.options.clone())).map_err(|e| {
            ConnectorError::invalid_configuration(format!(
                "invalid options for connector type '{}': {e}",
                self.kind
            ))
        })
    }
}

/// One named unit of work pairing a source query with a destination target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSetConfig {
    pub name: String,

    /// Skip this sync-set entirely.
    #[serde(default)]
    pub disable: bool,

    /// Opaque per-set options for the source adapter.
    #[serde(default)]
    pub source: Value,

    /// Opaque per-set options for the destination adapter.
    #[serde(default)]
    pub destination: Value,
}

impl SyncSetConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Per-set source options, or the type's default when none were given.
    pub fn source_options<T: DeserializeOwned + Default>(&self) -> ConnectorResult<T> {
        parse_set_options(&self.name, "source", &self.source)
    }

    /// Per-set destination options, or the type's default when none were given.
    pub fn destination_options<T: DeserializeOwned + Default>(&self) -> ConnectorResult<T> {
        parse_set_options(&self.name, "destination", &self.destination)
    }
}

fn parse_set_options<T: DeserializeOwned + Default>(
    set_name: &str,
    side: &str,
    value: &Value,
) -> ConnectorResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| {
        ConnectorError::invalid_configuration(format!(
            "invalid {side} options for sync set '{set_name}': {e}"
        ))
    })
}
