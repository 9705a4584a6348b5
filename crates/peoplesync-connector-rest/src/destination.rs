//! REST destination.
//!
//! Listing works like the source. Writes go through [`RestWriter`], which the
//! shared `apply_change_set` drives with the configured batch pacing.

use async_trait::async_trait;
use peoplesync_connector::apply::{apply_change_set, PersonWriter};
use peoplesync_connector::config::{ConnectorSettings, SyncSetConfig};
use peoplesync_connector::error::{ConnectorError, ConnectorResult};
use peoplesync_connector::events::EventLog;
use peoplesync_connector::person::{ChangeResults, ChangeSet, Person};
use peoplesync_connector::traits::{Connector, Destination};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::RestClient;
use crate::config::{
    validate_item_path, DestinationSetOptions, HttpMethod, RepeatedField, RestDestinationConfig,
    ID_PLACEHOLDER,
};
use crate::record;
use crate::REST_CONNECTOR_TYPE;

/// Endpoints writes are sent to for the current sync-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePaths {
    pub create: String,
    pub update: String,
    pub delete: String,
}

/// Sends single-person writes to the REST API.
#[derive(Debug)]
pub struct RestWriter {
    client: RestClient,
    paths: WritePaths,
    update_method: HttpMethod,
    delete_enabled: bool,
    compare_attribute: String,
    repeated_fields: Vec<RepeatedField>,
}

impl RestWriter {
    fn item_path(template: &str, person: &Person) -> ConnectorResult<String> {
        if person.id.is_empty() {
            return Err(ConnectorError::invalid_data(format!(
                "{} has no destination id",
                person.compare_value
            )));
        }
        Ok(template.replace(ID_PLACEHOLDER, &urlencoding::encode(&person.id)))
    }

    fn body(&self, person: &Person) -> serde_json::Value {
        record::to_body(person, &self.compare_attribute, &self.repeated_fields)
    }
}

#[async_trait]
impl PersonWriter for RestWriter {
    fn supports_delete(&self) -> bool {
        self.delete_enabled
    }

    async fn create_person(&self, person: &Person) -> ConnectorResult<()> {
        let body = self.body(person);
        self.client
            .write(HttpMethod::Post, &self.paths.create, Some(&body))
            .await
    }

    async fn update_person(&self, person: &Person) -> ConnectorResult<()> {
        let path = Self::item_path(&self.paths.update, person)?;
        let body = self.body(person);
        self.client
            .write(self.update_method, &path, Some(&body))
            .await
    }

    async fn delete_person(&self, person: &Person) -> ConnectorResult<()> {
        let path = Self::item_path(&self.paths.delete, person)?;
        self.client.write(HttpMethod::Delete, &path, None).await
    }
}

/// Lists and writes people through a REST API.
pub struct RestDestination {
    config: RestDestinationConfig,
    client: RestClient,
    display_name: String,
    list_path: String,
    writer: Arc<RestWriter>,
}

impl std::fmt::Debug for RestDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDestination")
            .field("client", &self.client)
            .field("list_path", &self.list_path)
            .field("paths", &self.writer.paths)
            .finish()
    }
}

impl RestDestination {
    pub fn new(config: RestDestinationConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let client = RestClient::new(config.connection.clone())?;

        let paths = WritePaths {
            create: config.create_path.clone(),
            update: config.update_path.clone(),
            delete: config.delete_path.clone(),
        };

        Ok(Self {
            display_name: format!("REST: {}", config.connection.base_url),
            list_path: config.list.list_path.clone(),
            writer: Arc::new(Self::writer(&config, &client, paths)),
            client,
            config,
        })
    }

    /// Build from a `type: rest` settings block.
    pub fn from_settings(settings: &ConnectorSettings) -> ConnectorResult<Self> {
        Self::new(settings.parse()?)
    }

    fn writer(config: &RestDestinationConfig, client: &RestClient, paths: WritePaths) -> RestWriter {
        RestWriter {
            client: client.clone(),
            paths,
            update_method: config.update_method,
            delete_enabled: config.delete_enabled,
            compare_attribute: config.list.compare_attribute.clone(),
            repeated_fields: config.list.repeated_fields.clone(),
        }
    }

    /// Path listed by the current sync-set.
    pub fn list_path(&self) -> &str {
        &self.list_path
    }

    /// Write endpoints for the current sync-set.
    pub fn write_paths(&self) -> &WritePaths {
        &self.writer.paths
    }

    fn set_paths(&self, options: &DestinationSetOptions) -> ConnectorResult<WritePaths> {
        let paths = WritePaths {
            create: options
                .create_path
                .clone()
                .unwrap_or_else(|| self.config.create_path.clone()),
            update: options
                .update_path
                .clone()
                .unwrap_or_else(|| self.config.update_path.clone()),
            delete: options
                .delete_path
                .clone()
                .unwrap_or_else(|| self.config.delete_path.clone()),
        };
        validate_item_path("update_path", &paths.update)?;
        validate_item_path("delete_path", &paths.delete)?;
        Ok(paths)
    }
}

impl Connector for RestDestination {
    fn connector_type(&self) -> &str {
        REST_CONNECTOR_TYPE
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

#[async_trait]
impl Destination for RestDestination {
    fn id_field(&self) -> &str {
        &self.config.id_field
    }

    fn validate_set(&self, set: &SyncSetConfig) -> ConnectorResult<()> {
        let options: DestinationSetOptions = set.destination_options()?;
        self.set_paths(&options).map(|_| ())
    }

    async fn for_set(&mut self, set: &SyncSetConfig) -> ConnectorResult<()> {
        let options: DestinationSetOptions = set.destination_options()?;

        let paths = self.set_paths(&options)?;
        self.list_path = options
            .list_path
            .unwrap_or_else(|| self.config.list.list_path.clone());

        debug!(
            set = %set.name,
            list_path = %self.list_path,
            create_path = %paths.create,
            "REST destination configured"
        );
        self.writer = Arc::new(Self::writer(&self.config, &self.client, paths));
        Ok(())
    }

    #[instrument(skip(self, _desired_attrs), fields(destination = %self.display_name))]
    async fn list_users(&self, _desired_attrs: &[String]) -> ConnectorResult<Vec<Person>> {
        let records = self
            .client
            .list_records(&self.list_path, &self.config.list, &[])
            .await?;

        let fetched = records.len();
        let people: Vec<Person> = records
            .iter()
            .filter_map(|value| {
                record::to_person(
                    value,
                    &self.config.list.compare_attribute,
                    &self.config.id_field,
                    &self.config.list.repeated_fields,
                )
            })
            .collect();

        if people.len() < fetched {
            warn!(
                skipped = fetched - people.len(),
                compare_attribute = %self.config.list.compare_attribute,
                "Skipped records without a compare value"
            );
        }
        info!(listed = people.len(), "Listed REST destination people");

        Ok(people)
    }

    async fn apply_change_set(&self, changes: &ChangeSet, events: EventLog) -> ChangeResults {
        apply_change_set(Arc::clone(&self.writer), changes, self.config.batch, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestConfig;
    use serde_json::json;

    fn destination() -> RestDestination {
        RestDestination::new(RestDestinationConfig::new(RestConfig::new(
            "https://dir.example.org",
        )))
        .unwrap()
    }

    #[test]
    fn test_item_path_substitutes_id() {
        let person = Person::new("jo@example.org").with_id("u 1/2");
        let path = RestWriter::item_path("/users/{id}/profile", &person).unwrap();
        assert_eq!(path, "/users/u%201%2F2/profile");
    }

    #[test]
    fn test_item_path_requires_id() {
        let err = RestWriter::item_path("/users/{id}", &Person::new("jo@example.org")).unwrap_err();
        assert!(err.to_string().contains("jo@example.org"));
    }

    #[test]
    fn test_from_settings() {
        let settings = ConnectorSettings::new("rest")
            .with_option("base_url", "https://dir.example.org")
            .with_option("id_field", "uuid")
            .with_option("delete_enabled", false);
        let destination = RestDestination::from_settings(&settings).unwrap();

        assert_eq!(destination.id_field(), "uuid");
        assert_eq!(destination.connector_type(), "rest");
        assert!(!destination.writer.supports_delete());
    }

    #[tokio::test]
    async fn test_for_set_overrides_paths() {
        let mut destination = destination();
        let set = SyncSetConfig {
            destination: json!({
                "list_path": "/groups/staff/members",
                "create_path": "/groups/staff/members",
                "delete_path": "/groups/staff/members/{id}"
            }),
            ..SyncSetConfig::new("staff")
        };
        destination.for_set(&set).await.unwrap();

        assert_eq!(destination.list_path(), "/groups/staff/members");
        assert_eq!(
            destination.write_paths(),
            &WritePaths {
                create: "/groups/staff/members".to_string(),
                update: "/users/{id}".to_string(),
                delete: "/groups/staff/members/{id}".to_string(),
            }
        );

        destination.for_set(&SyncSetConfig::new("all")).await.unwrap();
        assert_eq!(destination.write_paths().create, "/users");
    }

    #[tokio::test]
    async fn test_for_set_rejects_path_without_id() {
        let mut destination = destination();
        let set = SyncSetConfig {
            destination: json!({"update_path": "/users"}),
            ..SyncSetConfig::new("staff")
        };
        assert!(destination.for_set(&set).await.is_err());
    }

    #[test]
    fn test_validate_set_checks_path_overrides() {
        let destination = destination();

        let set = SyncSetConfig {
            destination: json!({"update_path": "/users/no-placeholder"}),
            ..SyncSetConfig::new("broken")
        };
        assert!(destination.validate_set(&set).is_err());

        let set = SyncSetConfig {
            destination: json!({"delete_path": "/staff/{id}"}),
            ..SyncSetConfig::new("staff")
        };
        destination.validate_set(&set).unwrap();
        assert_eq!(destination.write_paths().delete, "/users/{id}");
    }
}
