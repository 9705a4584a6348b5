//! # REST Connector
//!
//! Generic REST API source and destination for peoplesync.
//!
//! ## Features
//!
//! - Basic, bearer and API key authentication
//! - Page-based pagination and nested results arrays
//! - Nested objects flattened to dotted attribute keys
//! - Repeated sub-records flattened to compound keys
//! - Per sync-set endpoint overrides
//! - Paced create/update/delete with PUT or PATCH updates
//!
//! ## Example
//!
//! ```ignore
//! use peoplesync_connector::registry::ConnectorRegistry;
//!
//! let mut registry = ConnectorRegistry::new();
//! peoplesync_connector_rest::register(&mut registry);
//!
//! let source = registry.build_source(&config.source)?;
//! ```

pub mod client;
pub mod config;
pub mod destination;
pub mod record;
pub mod source;

use peoplesync_connector::registry::ConnectorRegistry;
use peoplesync_connector::traits::{BoxedDestination, BoxedSource};

// Re-exports
pub use client::RestClient;
pub use config::{
    AuthConfig, DestinationSetOptions, HttpMethod, ListConfig, PaginationConfig, RepeatedField,
    RestConfig, RestDestinationConfig, RestSourceConfig, SourceSetOptions,
};
pub use destination::{RestDestination, RestWriter, WritePaths};
pub use source::RestSource;

/// Registry key of the REST adapters.
pub const REST_CONNECTOR_TYPE: &str = "rest";

/// Register the REST source and destination factories.
pub fn register(registry: &mut ConnectorRegistry) -> &mut ConnectorRegistry {
    registry
        .register_source(REST_CONNECTOR_TYPE, |settings| {
            Ok(Box::new(RestSource::from_settings(settings)?) as BoxedSource)
        })
        .register_destination(REST_CONNECTOR_TYPE, |settings| {
            Ok(Box::new(RestDestination::from_settings(settings)?) as BoxedDestination)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use peoplesync_connector::config::ConnectorSettings;

    #[test]
    fn test_register() {
        let mut registry = ConnectorRegistry::new();
        register(&mut registry);

        assert!(registry.has_source("rest"));
        assert!(registry.has_destination("REST"));

        let settings =
            ConnectorSettings::new("rest").with_option("base_url", "https://hr.example.org");
        let source = registry.build_source(&settings).unwrap();
        assert_eq!(source.connector_type(), "rest");

        let destination = registry.build_destination(&settings).unwrap();
        assert_eq!(destination.id_field(), "id");
    }

    #[test]
    fn test_registered_factory_reports_bad_options() {
        let mut registry = ConnectorRegistry::new();
        register(&mut registry);

        let err = registry
            .build_source(&ConnectorSettings::new("rest"))
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
