//! REST Connector configuration
//!
//! Configuration types for REST API sources and destinations. Both are read
//! from the connector's settings block:
//!
//! ```yaml
//! destination:
//!   type: rest
//!   base_url: https://directory.example.org/api
//!   auth:
//!     type: bearer
//!     token: secret
//!   list_path: /people
//!   results_path: data.items
//!   compare_attribute: email
//!   update_method: PATCH
//!   batch_size: 20
//! ```

use peoplesync_connector::apply::ApplyOptions;
use peoplesync_connector::error::{ConnectorError, ConnectorResult};
use peoplesync_connector::filter::Filter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder replaced by a person's destination identifier in paths.
pub const ID_PLACEHOLDER: &str = "{id}";

const REDACTED: &str = "***REDACTED***";

/// HTTP method for API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// How requests authenticate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        #[serde(default = "default_api_key_header")]
        header_name: String,
    },
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

impl AuthConfig {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            header_name: default_api_key_header(),
        }
    }

    /// Copy with every secret replaced, for logging.
    #[must_use]
    pub fn redacted(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Basic { username, .. } => Self::basic(username.clone(), REDACTED),
            Self::Bearer { .. } => Self::bearer(REDACTED),
            Self::ApiKey { header_name, .. } => Self::ApiKey {
                key: REDACTED.to_string(),
                header_name: header_name.clone(),
            },
        }
    }
}

/// Connection settings shared by the REST source and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL for API requests (e.g., "https://api.example.com/v1").
    pub base_url: String,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: AuthConfig::None,
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn with_basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with_auth(AuthConfig::basic(username, password))
    }

    #[must_use]
    pub fn with_bearer_token(self, token: impl Into<String>) -> Self {
        self.with_auth(AuthConfig::bearer(token))
    }

    #[must_use]
    pub fn with_api_key(self, key: impl Into<String>) -> Self {
        self.with_auth(AuthConfig::api_key(key))
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Build the full URL for an endpoint.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub fn validate(&self) -> ConnectorResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration("base_url is required"));
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConnectorError::invalid_configuration(format!("invalid base_url: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConnectorError::invalid_configuration(format!(
                    "unsupported base_url scheme: {other}"
                )))
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConnectorError::invalid_configuration(
                "timeout_secs must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Copy with credentials redacted.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.auth = config.auth.redacted();
        config
    }
}

/// Page-based pagination. Absent means the list endpoint returns everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Query parameter for the page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Query parameter for the page size.
    #[serde(default = "default_page_size_param")]
    pub page_size_param: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Number of the first page.
    #[serde(default = "default_start_page")]
    pub start_page: u32,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_size_param() -> String {
    "pageSize".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_start_page() -> u32 {
    1
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_param: default_page_param(),
            page_size_param: default_page_size_param(),
            page_size: default_page_size(),
            start_page: default_start_page(),
        }
    }
}

/// An array of objects flattened into compound attribute keys.
///
/// With `field: phones`, `discriminator: type` and `value: number`,
/// `{"phones": [{"type": "work", "number": "1"}]}` becomes the attribute
/// `phones|work = 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedField {
    /// JSON field holding the array.
    pub field: String,

    /// Member field naming each entry.
    pub discriminator: String,

    /// Member field holding each entry's value.
    pub value: String,

    /// Attribute prefix, defaults to `field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl RepeatedField {
    pub fn new(
        field: impl Into<String>,
        discriminator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            discriminator: discriminator.into(),
            value: value.into(),
            prefix: None,
        }
    }

    /// Attribute prefix used for compound keys.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.field)
    }
}

/// How list responses are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    /// Endpoint returning people.
    #[serde(default = "default_list_path")]
    pub list_path: String,

    /// Dotted path to the results array, e.g. "data.items". The body itself
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_path: Option<String>,

    /// Attribute joining source and destination people.
    #[serde(default = "default_compare_attribute")]
    pub compare_attribute: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repeated_fields: Vec<RepeatedField>,
}

fn default_list_path() -> String {
    "/users".to_string()
}

fn default_compare_attribute() -> String {
    "email".to_string()
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            list_path: default_list_path(),
            results_path: None,
            compare_attribute: default_compare_attribute(),
            pagination: None,
            repeated_fields: Vec::new(),
        }
    }
}

/// Configuration of the REST source (`type: rest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestSourceConfig {
    #[serde(flatten)]
    pub connection: RestConfig,

    #[serde(flatten)]
    pub list: ListConfig,

    /// Attribute copied into each person's id.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Query parameter receiving the comma separated attribute names the
    /// sync needs. Not sent when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_param: Option<String>,

    /// People must match every filter to be listed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

impl RestSourceConfig {
    pub fn new(connection: RestConfig) -> Self {
        Self {
            connection,
            list: ListConfig::default(),
            id_field: default_id_field(),
            attributes_param: None,
            filters: Vec::new(),
        }
    }

    pub fn validate(&self) -> ConnectorResult<()> {
        self.connection.validate()?;
        validate_list(&self.list)
    }
}

/// Configuration of the REST destination (`type: rest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestDestinationConfig {
    #[serde(flatten)]
    pub connection: RestConfig,

    #[serde(flatten)]
    pub list: ListConfig,

    /// Attribute of listed people holding their identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    #[serde(default = "default_create_path")]
    pub create_path: String,

    /// Must contain `{id}`.
    #[serde(default = "default_item_path")]
    pub update_path: String,

    /// Must contain `{id}`.
    #[serde(default = "default_item_path")]
    pub delete_path: String,

    /// PUT or PATCH.
    #[serde(default = "default_update_method")]
    pub update_method: HttpMethod,

    /// When false, deletions are reported and skipped.
    #[serde(default = "default_true")]
    pub delete_enabled: bool,

    #[serde(flatten)]
    pub batch: ApplyOptions,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_create_path() -> String {
    "/users".to_string()
}

fn default_item_path() -> String {
    "/users/{id}".to_string()
}

fn default_update_method() -> HttpMethod {
    HttpMethod::Put
}

fn default_true() -> bool {
    true
}

impl RestDestinationConfig {
    pub fn new(connection: RestConfig) -> Self {
        Self {
            connection,
            list: ListConfig::default(),
            id_field: default_id_field(),
            create_path: default_create_path(),
            update_path: default_item_path(),
            delete_path: default_item_path(),
            update_method: default_update_method(),
            delete_enabled: true,
            batch: ApplyOptions::default(),
        }
    }

    pub fn validate(&self) -> ConnectorResult<()> {
        self.connection.validate()?;
        validate_list(&self.list)?;

        if !matches!(self.update_method, HttpMethod::Put | HttpMethod::Patch) {
            return Err(ConnectorError::invalid_configuration(format!(
                "update_method must be PUT or PATCH, got {}",
                self.update_method.as_str()
            )));
        }
        validate_item_path("update_path", &self.update_path)?;
        validate_item_path("delete_path", &self.delete_path)
    }
}

fn validate_list(list: &ListConfig) -> ConnectorResult<()> {
    if list.compare_attribute.trim().is_empty() {
        return Err(ConnectorError::invalid_configuration(
            "compare_attribute must not be empty",
        ));
    }
    if let Some(pagination) = &list.pagination {
        if pagination.page_size == 0 {
            return Err(ConnectorError::invalid_configuration(
                "pagination.page_size must be greater than zero",
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_item_path(name: &str, path: &str) -> ConnectorResult<()> {
    if path.contains(ID_PLACEHOLDER) {
        Ok(())
    } else {
        Err(ConnectorError::invalid_configuration(format!(
            "{name} must contain {ID_PLACEHOLDER}: {path}"
        )))
    }
}

/// Per sync-set overrides for the REST source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSetOptions {
    #[serde(default)]
    pub list_path: Option<String>,

    /// Replaces the global filters when present.
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
}

/// Per sync-set overrides for the REST destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSetOptions {
    #[serde(default)]
    pub list_path: Option<String>,
    #[serde(default)]
    pub create_path: Option<String>,
    #[serde(default)]
    pub update_path: Option<String>,
    #[serde(default)]
    pub delete_path: Option<String>,
}
