//! CLI command implementations

pub mod run;
pub mod validate;

use peoplesync_connector::registry::ConnectorRegistry;

/// Registry holding every connector type this binary ships with.
pub fn connector_registry() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    peoplesync_connector_rest::register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_connectors_registered() {
        let registry = connector_registry();
        assert!(registry.has_source("rest"));
        assert!(registry.has_destination("rest"));
        assert!(!registry.has_source("ldap"));
    }
}
