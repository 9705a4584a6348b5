//! HTTP client shared by the REST source and destination.

use peoplesync_connector::error::{ConnectorError, ConnectorResult};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, trace};

use crate::config::{AuthConfig, HttpMethod, ListConfig, RestConfig};
use crate::record;

/// Authenticated JSON client for one REST API.
#[derive(Clone)]
pub struct RestClient {
    config: RestConfig,
    client: Client,
    authorization: Option<String>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("config", &self.config.redacted())
            .finish()
    }
}

impl RestClient {
    /// Validate `config` and build the client.
    pub fn new(config: RestConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ConnectorError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;

        let authorization = match &config.auth {
            AuthConfig::Basic { username, password } => Some(format!(
                "Basic {}",
                base64_encode(format!("{username}:{password}"))
            )),
            AuthConfig::Bearer { token } => Some(format!("Bearer {token}")),
            AuthConfig::None | AuthConfig::ApiKey { .. } => None,
        };

        Ok(Self {
            config,
            client,
            authorization,
        })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Build a request with every configured header.
    fn request(&self, method: HttpMethod, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        let mut builder = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        builder = builder.header(header::ACCEPT, "application/json");
        for (name, value) in &self.config.headers {
            builder = builder.header(name, value);
        }

        if let Some(authorization) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        if let AuthConfig::ApiKey { key, header_name } = &self.config.auth {
            builder = builder.header(header_name, key);
        }

        builder
    }

    /// Send a request and fail on any non-success status.
    async fn send(&self, method: HttpMethod, builder: RequestBuilder) -> ConnectorResult<Response> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(method = method.as_str(), url = %response.url(), status = %status, "REST response");

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(response_error(status, &body))
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> ConnectorError {
        if error.is_timeout() {
            ConnectorError::ConnectionTimeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            ConnectorError::connection_failed_with_source(
                format!("request to {} failed", self.config.base_url),
                error,
            )
        }
    }

    /// GET `path` and parse the body as JSON.
    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> ConnectorResult<Value> {
        let mut builder = self.request(HttpMethod::Get, path);
        if !query.is_empty() {
            builder = builder.query(query);
        }

        let response = self.send(HttpMethod::Get, builder).await?;
        response.json().await.map_err(|e| {
            ConnectorError::invalid_data(format!("response from {path} is not JSON: {e}"))
        })
    }

    /// Send `body` (if any) with `method`. The response body is ignored.
    pub async fn write(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> ConnectorResult<()> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            trace!(body = %body, "Request body");
            builder = builder.json(body);
        }

        self.send(method, builder).await.map(|_| ())
    }

    /// Fetch every record of a list endpoint, following pagination.
    #[instrument(skip(self, list, extra_query), fields(path = %path))]
    pub async fn list_records(
        &self,
        path: &str,
        list: &ListConfig,
        extra_query: &[(String, String)],
    ) -> ConnectorResult<Vec<Value>> {
        let results_path = list.results_path.as_deref();

        let Some(pagination) = &list.pagination else {
            let body = self.get_json(path, extra_query).await?;
            return record::extract_results(&body, results_path)
                .ok_or_else(|| missing_results(path, results_path));
        };

        let mut records = Vec::new();
        let mut page = pagination.start_page;

        loop {
            let mut query = extra_query.to_vec();
            query.push((pagination.page_param.clone(), page.to_string()));
            query.push((
                pagination.page_size_param.clone(),
                pagination.page_size.to_string(),
            ));

            let body = self.get_json(path, &query).await?;
            let batch = record::extract_results(&body, results_path)
                .ok_or_else(|| missing_results(path, results_path))?;
            let fetched = batch.len();
            records.extend(batch);

            debug!(page, fetched, total = records.len(), "Fetched page");

            if fetched < pagination.page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}

fn missing_results(path: &str, results_path: Option<&str>) -> ConnectorError {
    ConnectorError::invalid_data(format!(
        "no results array at '{}' in response from {path}",
        results_path.unwrap_or("<body>")
    ))
}

/// Map an unsuccessful response to a connector error.
///
/// Rate limiting and gateway failures are transient; everything else needs a
/// human.
pub fn response_error(status: StatusCode, body: &str) -> ConnectorError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => ConnectorError::AuthenticationFailed,
        StatusCode::FORBIDDEN => ConnectorError::AuthorizationFailed {
            operation: message,
        },
        StatusCode::TOO_MANY_REQUESTS => ConnectorError::TargetUnavailable {
            message: format!("rate limited: {message}"),
        },
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ConnectorError::TargetUnavailable {
                message: format!("HTTP {status}: {message}"),
            }
        }
        StatusCode::NOT_FOUND => ConnectorError::ObjectNotFound {
            identifier: message,
        },
        StatusCode::CONFLICT => ConnectorError::ObjectAlreadyExists {
            identifier: message,
        },
        _ => ConnectorError::operation_failed(format!("HTTP {status}: {message}")),
    }
}

fn base64_encode(data: impl AsRef<[u8]>) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_invalid_config() {
        assert!(RestClient::new(RestConfig::new("not-a-url")).is_err());
    }

    #[test]
    fn test_basic_authorization_header() {
        let client =
            RestClient::new(RestConfig::new("https://api.example.com").with_basic_auth("a", "b"))
                .unwrap();
        assert_eq!(client.authorization.as_deref(), Some("Basic YTpi"));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let client = RestClient::new(
            RestConfig::new("https://api.example.com").with_bearer_token("top-secret"),
        )
        .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_transient_statuses() {
        for status in [
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            assert!(response_error(status, "").is_transient(), "{status}");
        }
    }

    #[test]
    fn test_permanent_statuses() {
        assert!(matches!(
            response_error(StatusCode::UNAUTHORIZED, ""),
            ConnectorError::AuthenticationFailed
        ));
        let err = response_error(StatusCode::BAD_REQUEST, r#"{"message": "email invalid"}"#);
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "operation failed: HTTP 400 Bad Request: email invalid");
        assert!(!response_error(StatusCode::INTERNAL_SERVER_ERROR, "boom").is_transient());
    }
}
