//! Integration tests for the REST connector using wiremock.
//!
//! These tests verify the source and destination against a mock HTTP server,
//! covering authentication, pagination, flattening, filters, per-set
//! overrides, writes and error classification.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use peoplesync_connector::apply::ApplyOptions;
use peoplesync_connector::config::SyncSetConfig;
use peoplesync_connector::events::{EventLog, EventLogItem, Severity};
use peoplesync_connector::filter::Filter;
use peoplesync_connector::person::{ChangeResults, ChangeSet, Person};
use peoplesync_connector::traits::{Destination, Source};
use peoplesync_connector_rest::{
    HttpMethod, PaginationConfig, RepeatedField, RestConfig, RestDestination,
    RestDestinationConfig, RestSource, RestSourceConfig,
};

// =============================================================================
// Test Helpers
// =============================================================================

async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

fn source_config(base_url: &str) -> RestSourceConfig {
    RestSourceConfig::new(RestConfig::new(base_url))
}

fn destination_config(base_url: &str) -> RestDestinationConfig {
    let mut config = RestDestinationConfig::new(RestConfig::new(base_url));
    config.batch = ApplyOptions::unpaced();
    config
}

async fn apply(
    destination: &RestDestination,
    changes: &ChangeSet,
) -> (ChangeResults, Vec<EventLogItem>) {
    let (events, mut receiver) = EventLog::channel(16);
    let consumer = tokio::spawn(async move {
        let mut items = Vec::new();
        while let Some(item) = receiver.recv().await {
            items.push(item);
        }
        items
    });

    let results = destination.apply_change_set(changes, events).await;
    let items = consumer.await.unwrap();
    (results, items)
}

fn alerts(items: &[EventLogItem]) -> Vec<&EventLogItem> {
    items.iter().filter(|i| i.severity.is_alert_worthy()).collect()
}

// =============================================================================
// Source: listing
// =============================================================================

#[tokio::test]
async fn test_source_lists_and_flattens() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "u-1",
                "email": "jo@example.org",
                "name": {"given": "Jo", "family": "Bloggs"},
                "phones": [
                    {"type": "work", "number": "111"},
                    {"type": "work", "number": "222"}
                ]
            },
            {"id": "u-2", "name": {"given": "No Email"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = source_config(&server.uri());
    config.list.repeated_fields = vec![RepeatedField::new("phones", "type", "number")];
    let source = RestSource::new(config).unwrap();

    let people = source.list_users(&[]).await.unwrap();

    assert_eq!(people.len(), 1);
    let jo = &people[0];
    assert_eq!(jo.compare_value, "jo@example.org");
    assert_eq!(jo.id, "u-1");
    assert_eq!(jo.attributes.get("name.given"), Some("Jo"));
    assert_eq!(jo.attributes.get("name.family"), Some("Bloggs"));
    assert_eq!(jo.attributes.get("phones|work"), Some("111"));
    assert_eq!(jo.attributes.get("phones|work~1"), Some("222"));
}

#[tokio::test]
async fn test_source_results_path_and_pagination() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/people"))
        .and(query_param("page", "1"))
        .and(query_param("size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [{"email": "a@example.org"}, {"email": "b@example.org"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [{"email": "c@example.org"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = source_config(&server.uri());
    config.list.list_path = "/people".to_string();
    config.list.results_path = Some("data.items".to_string());
    config.list.pagination = Some(PaginationConfig {
        page_size_param: "size".to_string(),
        page_size: 2,
        ..PaginationConfig::default()
    });
    let source = RestSource::new(config).unwrap();

    let people = source.list_users(&[]).await.unwrap();
    let emails: Vec<&str> = people.iter().map(|p| p.compare_value.as_str()).collect();
    assert_eq!(emails, vec!["a@example.org", "b@example.org", "c@example.org"]);
}

#[tokio::test]
async fn test_source_missing_results_array() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "none"})))
        .mount(&server)
        .await;

    let mut config = source_config(&server.uri());
    config.list.results_path = Some("data".to_string());
    let source = RestSource::new(config).unwrap();

    let err = source.list_users(&[]).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_DATA");
}

#[tokio::test]
async fn test_source_sends_desired_attributes() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("fields", "email,givenName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = source_config(&server.uri());
    config.attributes_param = Some("fields".to_string());
    let source = RestSource::new(config).unwrap();

    let people = source
        .list_users(&["email".to_string(), "givenName".to_string()])
        .await
        .unwrap();
    assert!(people.is_empty());
}

#[tokio::test]
async fn test_source_filters_and_set_overrides() {
    let server = setup_mock_server().await;

    let body = json!([
        {"email": "a@example.org", "status": "active"},
        {"email": "b@example.org", "status": "left"}
    ]);
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/groups/alumni/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let mut config = source_config(&server.uri());
    config.filters = vec![Filter::new("status", "^active$")];
    let mut source = RestSource::new(config).unwrap();

    source.for_set(&SyncSetConfig::new("staff")).await.unwrap();
    let staff = source.list_users(&[]).await.unwrap();
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0].compare_value, "a@example.org");

    let alumni = SyncSetConfig {
        source: json!({
            "list_path": "/groups/alumni/members",
            "filters": [{"attribute": "status", "expression": "^left$"}]
        }),
        ..SyncSetConfig::new("alumni")
    };
    source.for_set(&alumni).await.unwrap();
    let left = source.list_users(&[]).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].compare_value, "b@example.org");
}

// =============================================================================
// Authentication and headers
// =============================================================================

#[tokio::test]
async fn test_bearer_token_authentication() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("Authorization", "Bearer test-token-123"))
        .and(header("X-Tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = RestSourceConfig::new(
        RestConfig::new(server.uri())
            .with_bearer_token("test-token-123")
            .with_header("X-Tenant", "acme"),
    );
    let source = RestSource::new(config).unwrap();

    assert!(source.list_users(&[]).await.is_ok());
}

#[tokio::test]
async fn test_basic_authentication() {
    let server = setup_mock_server().await;

    // base64("admin:secret")
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config =
        RestSourceConfig::new(RestConfig::new(server.uri()).with_basic_auth("admin", "secret"));
    let source = RestSource::new(config).unwrap();

    assert!(source.list_users(&[]).await.is_ok());
}

#[tokio::test]
async fn test_api_key_authentication() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("X-API-Key", "key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = RestSourceConfig::new(RestConfig::new(server.uri()).with_api_key("key-1"));
    let source = RestSource::new(config).unwrap();

    assert!(source.list_users(&[]).await.is_ok());
}

// =============================================================================
// Error classification
// =============================================================================

#[tokio::test]
async fn test_unavailable_is_transient() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let source = RestSource::new(source_config(&server.uri())).unwrap();
    let err = source.list_users(&[]).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_is_permanent() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let source = RestSource::new(source_config(&server.uri())).unwrap();
    let err = source.list_users(&[]).await.unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(err.error_code(), "AUTH_FAILED");
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let server = setup_mock_server().await;
    let uri = server.uri();
    drop(server);

    let source = RestSource::new(source_config(&uri)).unwrap();
    let err = source.list_users(&[]).await.unwrap_err();
    assert!(err.is_transient());
}

// =============================================================================
// Destination
// =============================================================================

#[tokio::test]
async fn test_destination_lists_with_id_field() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"uuid": "d-1", "email": "jo@example.org", "name": "Jo"}
        ])))
        .mount(&server)
        .await;

    let mut config = destination_config(&server.uri());
    config.id_field = "uuid".to_string();
    let destination = RestDestination::new(config).unwrap();

    let people = destination.list_users(&[]).await.unwrap();
    assert_eq!(destination.id_field(), "uuid");
    assert_eq!(people[0].id, "d-1");
    assert_eq!(people[0].attributes.get("uuid"), Some("d-1"));
}

#[tokio::test]
async fn test_destination_applies_changes() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"email": "new@example.org", "name": {"given": "New"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "d-9"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/users/d-2"))
        .and(body_json(json!({"email": "jo@example.org", "title": "Lead"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/d-3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = destination_config(&server.uri());
    config.update_method = HttpMethod::Patch;
    let destination = RestDestination::new(config).unwrap();

    let changes = ChangeSet {
        create: vec![Person::new("new@example.org").with_attribute("name.given", "New")],
        update: vec![Person::new("jo@example.org")
            .with_id("d-2")
            .with_attribute("title", "Lead")],
        delete: vec![Person::new("gone@example.org").with_id("d-3")],
    };

    let (results, items) = apply(&destination, &changes).await;

    assert_eq!(
        results,
        ChangeResults {
            created: 1,
            updated: 1,
            deleted: 1
        }
    );
    assert!(alerts(&items).is_empty());
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_destination_write_failures_isolated() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"email": "bad@example.org"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "rejected"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"email": "busy@example.org"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"email": "ok@example.org"})))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let destination = RestDestination::new(destination_config(&server.uri())).unwrap();
    let changes = ChangeSet {
        create: vec![
            Person::new("bad@example.org"),
            Person::new("busy@example.org"),
            Person::new("ok@example.org"),
        ],
        ..ChangeSet::new()
    };

    let (results, items) = apply(&destination, &changes).await;

    assert_eq!(results.created, 1);
    let alerts = alerts(&items);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].message.contains("bad@example.org"));
    assert!(alerts[0].message.contains("rejected"));
    assert!(items
        .iter()
        .any(|i| i.severity == Severity::Warning && i.message.contains("busy@example.org")));
}

#[tokio::test]
async fn test_destination_delete_disabled() {
    let server = setup_mock_server().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = destination_config(&server.uri());
    config.delete_enabled = false;
    let destination = RestDestination::new(config).unwrap();

    let changes = ChangeSet {
        delete: vec![Person::new("gone@example.org").with_id("d-3")],
        ..ChangeSet::new()
    };
    let (results, items) = apply(&destination, &changes).await;

    assert_eq!(results.deleted, 0);
    assert!(items.iter().any(|i| i.message.contains("skipped 1 deletions")));
}

#[tokio::test]
async fn test_destination_set_override_paths() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/groups/staff/members"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/groups/staff/members/d-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut destination = RestDestination::new(destination_config(&server.uri())).unwrap();
    let set = SyncSetConfig {
        destination: json!({
            "create_path": "/groups/staff/members",
            "update_path": "/groups/staff/members/{id}"
        }),
        ..SyncSetConfig::new("staff")
    };
    destination.for_set(&set).await.unwrap();

    let changes = ChangeSet {
        create: vec![Person::new("a@example.org")],
        update: vec![Person::new("b@example.org").with_id("d-2")],
        delete: Vec::new(),
    };
    let (results, _) = apply(&destination, &changes).await;
    assert_eq!(results.total(), 2);
}

#[tokio::test]
async fn test_update_without_id_is_alerted() {
    let server = setup_mock_server().await;
    let destination = RestDestination::new(destination_config(&server.uri())).unwrap();

    let changes = ChangeSet {
        update: vec![Person::new("jo@example.org")],
        ..ChangeSet::new()
    };
    let (results, items) = apply(&destination, &changes).await;

    assert_eq!(results.updated, 0);
    assert_eq!(alerts(&items).len(), 1);
}
