//! REST source.

use async_trait::async_trait;
use peoplesync_connector::config::{ConnectorSettings, SyncSetConfig};
use peoplesync_connector::error::ConnectorResult;
use peoplesync_connector::filter::Filters;
use peoplesync_connector::person::Person;
use peoplesync_connector::traits::{Connector, Source};
use tracing::{debug, info, instrument, warn};

use crate::client::RestClient;
use crate::config::{RestSourceConfig, SourceSetOptions};
use crate::record;
use crate::REST_CONNECTOR_TYPE;

/// Reads people from a REST list endpoint.
pub struct RestSource {
    config: RestSourceConfig,
    client: RestClient,
    display_name: String,
    list_path: String,
    filters: Filters,
}

impl std::fmt::Debug for RestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSource")
            .field("client", &self.client)
            .field("list_path", &self.list_path)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl RestSource {
    pub fn new(config: RestSourceConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let client = RestClient::new(config.connection.clone())?;
        let filters = Filters::compile(&config.filters)?;

        Ok(Self {
            display_name: format!("REST: {}", config.connection.base_url),
            list_path: config.list.list_path.clone(),
            filters,
            client,
            config,
        })
    }

    /// Build from a `type: rest` settings block.
    pub fn from_settings(settings: &ConnectorSettings) -> ConnectorResult<Self> {
        Self::new(settings.parse()?)
    }

    /// Path listed by the current sync-set.
    pub fn list_path(&self) -> &str {
        &self.list_path
    }

    fn set_filters(&self, options: &SourceSetOptions) -> ConnectorResult<Filters> {
        match &options.filters {
            Some(filters) => Filters::compile(filters),
            None => Filters::compile(&self.config.filters),
        }
    }
}

impl Connector for RestSource {
    fn connector_type(&self) -> &str {
        REST_CONNECTOR_TYPE
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

#[async_trait]
impl Source for RestSource {
    fn validate_set(&self, set: &SyncSetConfig) -> ConnectorResult<()> {
        let options: SourceSetOptions = set.source_options()?;
        self.set_filters(&options).map(|_| ())
    }

    async fn for_set(&mut self, set: &SyncSetConfig) -> ConnectorResult<()> {
        let options: SourceSetOptions = set.source_options()?;

        self.filters = self.set_filters(&options)?;
        self.list_path = options
            .list_path
            .unwrap_or_else(|| self.config.list.list_path.clone());

        debug!(
            set = %set.name,
            list_path = %self.list_path,
            filters = self.filters.len(),
            "REST source configured"
        );
        Ok(())
    }

    #[instrument(skip(self, desired_attrs), fields(source = %self.display_name))]
    async fn list_users(&self, desired_attrs: &[String]) -> ConnectorResult<Vec<Person>> {
        let mut query = Vec::new();
        if let Some(param) = &self.config.attributes_param {
            query.push((param.clone(), desired_attrs.join(",")));
        }

        let records = self
            .client
            .list_records(&self.list_path, &self.config.list, &query)
            .await?;

        let fetched = records.len();
        let mut people = Vec::with_capacity(fetched);
        let mut unkeyed = 0;

        for value in &records {
            let Some(person) = record::to_person(
                value,
                &self.config.list.compare_attribute,
                &self.config.id_field,
                &self.config.list.repeated_fields,
            ) else {
                unkeyed += 1;
                continue;
            };

            if self.filters.matches(&person.attributes) {
                people.push(person);
            }
        }

        if unkeyed > 0 {
            warn!(
                unkeyed,
                compare_attribute = %self.config.list.compare_attribute,
                "Skipped records without a compare value"
            );
        }
        info!(fetched, listed = people.len(), "Listed REST source people");

        Ok(people)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestConfig;
    use peoplesync_connector::filter::Filter;
    use serde_json::json;

    fn source() -> RestSource {
        let mut config = RestSourceConfig::new(RestConfig::new("https://hr.example.org"));
        config.filters = vec![Filter::new("status", "^active$")];
        RestSource::new(config).unwrap()
    }

    #[test]
    fn test_from_settings() {
        let settings = ConnectorSettings::new("rest")
            .with_option("base_url", "https://hr.example.org/api")
            .with_option("list_path", "/employees");
        let source = RestSource::from_settings(&settings).unwrap();

        assert_eq!(source.connector_type(), "rest");
        assert_eq!(source.display_name(), "REST: https://hr.example.org/api");
        assert_eq!(source.list_path(), "/employees");
    }

    #[test]
    fn test_from_settings_requires_base_url() {
        let err = RestSource::from_settings(&ConnectorSettings::new("rest")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let mut config = RestSourceConfig::new(RestConfig::new("https://hr.example.org"));
        config.filters = vec![Filter::new("status", "([")];
        assert!(RestSource::new(config).is_err());
    }

    #[tokio::test]
    async fn test_for_set_overrides_and_restores() {
        let mut source = source();

        let set = SyncSetConfig {
            source: json!({"list_path": "/groups/staff", "filters": []}),
            ..SyncSetConfig::new("staff")
        };
        source.for_set(&set).await.unwrap();
        assert_eq!(source.list_path(), "/groups/staff");
        assert!(source.filters.is_empty());

        source.for_set(&SyncSetConfig::new("all")).await.unwrap();
        assert_eq!(source.list_path(), "/users");
        assert_eq!(source.filters.len(), 1);
    }

    #[tokio::test]
    async fn test_for_set_rejects_bad_options() {
        let mut source = source();
        let set = SyncSetConfig {
            source: json!({"list_path": 7}),
            ..SyncSetConfig::new("staff")
        };
        assert!(source.for_set(&set).await.is_err());
    }

    #[test]
    fn test_validate_set_checks_filter_overrides() {
        let source = source();

        let set = SyncSetConfig {
            source: json!({"filters": [{"attribute": "title", "expression": "(unclosed"}]}),
            ..SyncSetConfig::new("broken")
        };
        let err = source.validate_set(&set).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let set = SyncSetConfig {
            source: json!({"filters": [{"attribute": "title", "expression": "^Eng"}]}),
            ..SyncSetConfig::new("engineers")
        };
        source.validate_set(&set).unwrap();
        assert_eq!(source.filters.len(), 1);
        assert_eq!(source.list_path(), "/users");
    }
}
