//! Connector registry.
//!
//! Maps the `type` string of a [`ConnectorSettings`] block to a factory that
//! builds the adapter. Binaries register the adapters they link against; the
//! sync core only ever sees the boxed traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ConnectorSettings;
use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{BoxedDestination, BoxedSource};

/// Builds a source from its global settings.
pub type SourceFactory =
    Arc<dyn Fn(&ConnectorSettings) -> ConnectorResult<BoxedSource> + Send + Sync>;

/// Builds a destination from its global settings.
pub type DestinationFactory =
    Arc<dyn Fn(&ConnectorSettings) -> ConnectorResult<BoxedDestination> + Send + Sync>;

/// Registry of source and destination factories keyed by connector type.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    sources: BTreeMap<String, SourceFactory>,
    destinations: BTreeMap<String, DestinationFactory>,
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("sources", &self.source_types())
            .field("destinations", &self.destination_types())
            .finish()
    }
}

impl ConnectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source factory, replacing any previous one for `kind`.
    pub fn register_source<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ConnectorSettings) -> ConnectorResult<BoxedSource> + Send + Sync + 'static,
    {
        self.sources.insert(normalize(kind.into()), Arc::new(factory));
        self
    }

    /// Register a destination factory, replacing any previous one for `kind`.
    pub fn register_destination<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ConnectorSettings) -> ConnectorResult<BoxedDestination> + Send + Sync + 'static,
    {
        self.destinations
            .insert(normalize(kind.into()), Arc::new(factory));
        self
    }

    /// Registered source types, sorted.
    #[must_use]
    pub fn source_types(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Registered destination types, sorted.
    #[must_use]
    pub fn destination_types(&self) -> Vec<&str> {
        self.destinations.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn has_source(&self, kind: &str) -> bool {
        self.sources.contains_key(&normalize(kind.to_string()))
    }

    #[must_use]
    pub fn has_destination(&self, kind: &str) -> bool {
        self.destinations.contains_key(&normalize(kind.to_string()))
    }

    /// Build the source named by `settings.kind`.
    pub fn build_source(&self, settings: &ConnectorSettings) -> ConnectorResult<BoxedSource> {
        let factory = self
            .sources
            .get(&normalize(settings.kind.clone()))
            .ok_or_else(|| ConnectorError::UnsupportedConnectorType {
                connector_type: settings.kind.clone(),
            })?;
        factory(settings)
    }

    /// Build the destination named by `settings.kind`.
    pub fn build_destination(
        &self,
        settings: &ConnectorSettings,
    ) -> ConnectorResult<BoxedDestination> {
        let factory = self
            .destinations
            .get(&normalize(settings.kind.clone()))
            .ok_or_else(|| ConnectorError::UnsupportedConnectorType {
                connector_type: settings.kind.clone(),
            })?;
        factory(settings)
    }
}

fn normalize(kind: String) -> String {
    kind.trim().to_ascii_lowercase()
}
