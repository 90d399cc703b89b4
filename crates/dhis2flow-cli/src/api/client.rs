//! HTTP client for the DHIS2 Web API
//!
//! Implements the engine's [`Client`] capability over reqwest with basic
//! authentication. Rate limiting is applied by the engine around this client.

use crate::api::endpoints::{self, Resource};
use crate::api::types;
use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use dhis2flow_common::logging::log_request;
use dhis2flow_common::redact::{redact_text, redact_url};
use dhis2flow_engine::client::{Client, ClientError, FetchRequest, Page, PushAck, PushRequest};
use dhis2flow_engine::schema::RemoteVersion;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Longest server error body echoed back in an error message
const MAX_ERROR_BODY: usize = 200;

/// API client for one DHIS2 instance
pub struct Dhis2Client {
    http: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl Dhis2Client {
    /// Create a client from connection settings
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dhis2flow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Server version string as reported by `/api/system/info`
    pub async fn system_info(&self) -> std::result::Result<types::SystemInfo, ClientError> {
        let url = endpoints::system_info_url(&self.base_url);
        let body = self.get_json(&url, &[]).await?;
        types::decode_system_info(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Transport(redact_text(&err.to_string()))
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> std::result::Result<(StatusCode, String), ClientError> {
        let mut builder = self.http.request(method.clone(), url).query(params);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                log_request(method.as_str(), &redact_url(url), None, started.elapsed());
                return Err(self.transport_error(e));
            },
        };
        let status = response.status();
        log_request(method.as_str(), &redact_url(url), Some(status.as_u16()), started.elapsed());

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok((status, text))
    }

    async fn get_json(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<Value, ClientError> {
        let (status, text) = self.send(Method::GET, url, params, None).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// POST an import; a 409 with an import summary is still an answer
    async fn post_import(
        &self,
        url: &str,
        params: &[(String, String)],
        body: &Value,
    ) -> std::result::Result<PushAck, ClientError> {
        let (status, text) = self.send(Method::POST, url, params, Some(body)).await?;
        if status.is_success() || status == StatusCode::CONFLICT {
            if let Ok(summary) = serde_json::from_str::<Value>(&text) {
                return Ok(types::decode_import_summary(&summary));
            }
        }
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        Err(ClientError::Decode("import response is not JSON".into()))
    }
}

/// Prefer the `message` field of a DHIS2 error body
fn http_error(status: StatusCode, text: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| text.chars().take(MAX_ERROR_BODY).collect());
    ClientError::Http {
        status: status.as_u16(),
        message: redact_text(&message),
    }
}

#[async_trait]
impl Client for Dhis2Client {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<Page, ClientError> {
        let resource = Resource::from_endpoint(&request.endpoint)
            .ok_or_else(|| ClientError::Unsupported(request.endpoint.clone()))?;
        let url = endpoints::resource_url(&self.base_url, resource);
        debug!(endpoint = %request.endpoint, version = %request.version, "Fetching");

        let body = self.get_json(&url, &request.params).await?;
        match resource {
            Resource::Analytics => types::decode_analytics(body),
            Resource::DataValueSets => types::decode_data_values(body),
            Resource::TrackerEvents => types::decode_tracker_events(body),
            Resource::Metadata => {
                let requested: Vec<&str> = request
                    .params
                    .iter()
                    .filter(|(_, v)| v == "true")
                    .map(|(k, _)| k.as_str())
                    .collect();
                types::decode_metadata(body, &requested)
            },
        }
    }

    async fn push(&self, request: &PushRequest) -> std::result::Result<PushAck, ClientError> {
        let resource = Resource::from_endpoint(&request.endpoint)
            .ok_or_else(|| ClientError::Unsupported(request.endpoint.clone()))?;
        let url = endpoints::resource_url(&self.base_url, resource);
        let records = request.records.to_records();

        match resource {
            Resource::DataValueSets => {
                let body = json!({ "dataValues": records });
                self.post_import(&url, &request.params, &body).await
            },
            Resource::Metadata => {
                let collection = request
                    .get("type")
                    .ok_or_else(|| ClientError::Unsupported("metadata import without a type".into()))?
                    .to_string();
                let params: Vec<(String, String)> = request
                    .params
                    .iter()
                    .filter(|(k, _)| k != "type")
                    .cloned()
                    .collect();
                let mut body = serde_json::Map::new();
                body.insert(
                    collection,
                    Value::Array(records.into_iter().map(Value::Object).collect()),
                );
                self.post_import(&url, &params, &Value::Object(body)).await
            },
            Resource::Analytics | Resource::TrackerEvents => {
                Err(ClientError::Unsupported(format!("push to {}", request.endpoint)))
            },
        }
    }

    async fn version(&self) -> std::result::Result<RemoteVersion, ClientError> {
        let info = self.system_info().await?;
        let version: RemoteVersion = info.version.parse().unwrap_or(RemoteVersion::Unknown);
        debug!(server = %info.version, resolved = %version, "Server version");
        Ok(version)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dhis2flow_engine::table::Table;
    use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> Dhis2Client {
        let config = ConnectionConfig {
            url: Some(format!("{}/dhis", server.uri())),
            username: Some("admin".into()),
            password: Some("district".into()),
            ..ConnectionConfig::default()
        };
        Dhis2Client::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_version_from_system_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dhis/api/system/info.json"))
            .and(basic_auth("admin", "district"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "2.39.4"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).version().await.unwrap(), RemoteVersion::V2_39);
    }

    #[tokio::test]
    async fn test_fetch_analytics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dhis/api/analytics.json"))
            .and(query_param("dimension", "dx:d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "headers": [{"name": "dx"}, {"name": "pe"}, {"name": "ou"}, {"name": "value"}],
                "rows": [["d1", "2023", "o1", "5"]]
            })))
            .mount(&server)
            .await;

        let request = FetchRequest::new("analytics", RemoteVersion::V2_38).param("dimension", "dx:d1");
        let page = client(&server).fetch(&request).await.unwrap();
        assert_eq!(page.table.len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"message": "Maintenance"})),
            )
            .mount(&server)
            .await;

        let request = FetchRequest::new("dataValueSets", RemoteVersion::V2_38);
        let err = client(&server).fetch(&request).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Http {
                status: 503,
                message: "Maintenance".into()
            }
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_push_conflict_returns_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dhis/api/dataValueSets.json"))
            .and(body_json(json!({"dataValues": [{"dataElement": "de1", "value": 3}]})))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "status": "ERROR",
                "response": {
                    "status": "ERROR",
                    "importCount": {"imported": 0, "updated": 0, "ignored": 1, "deleted": 0},
                    "conflicts": [{"object": "de1", "value": "Data element not in data set"}]
                }
            })))
            .mount(&server)
            .await;

        let records = Table::from_rows(["dataElement", "value"], vec![vec![json!("de1"), json!(3)]]);
        let request = PushRequest::new("dataValueSets", records, RemoteVersion::V2_38);
        let ack = client(&server).push(&request).await.unwrap();
        assert!(ack.is_error());
        assert_eq!(ack.ignored, 1);
    }

    #[tokio::test]
    async fn test_unknown_endpoint_unsupported() {
        let server = MockServer::start().await;
        let request = FetchRequest::new("reports", RemoteVersion::V2_38);
        assert!(matches!(
            client(&server).fetch(&request).await,
            Err(ClientError::Unsupported(_))
        ));
    }
}
