//! Panel REST client
//!
//! Two sequential calls turn a backup index into a signed download URL:
//! list the server's backups, then ask the panel to sign a link for the
//! chosen one.

use crate::config::PanelConfig;
use crate::error::PanelError;
use panelbak_types::{Backup, BackupListResponse};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A backup whose download link has been signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBackup {
    pub uuid: String,
    pub url: String,
}

/// Build the HTTP client shared by the API calls and the downloader
pub fn build_http_client() -> Result<Client, PanelError> {
    let client = Client::builder()
        .user_agent(concat!("panelbak/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

/// Authenticated client for one panel server
#[derive(Debug, Clone)]
pub struct PanelClient {
    client: Client,
    config: PanelConfig,
}

impl PanelClient {
    pub fn new(client: Client, config: PanelConfig) -> Self {
        Self { client, config }
    }

    /// UUID of the backup at the configured index
    ///
    /// An index past the end of the list, or a body without the field,
    /// yields an empty string rather than an error.
    pub async fn list_backups(&self) -> Result<String, PanelError> {
        let index = self.config.backup_index;
        info!("Listing backups for server {}", self.config.server_id);

        let body = self.get_json(&self.config.backups_url()).await?;
        let index_segment = format!("[{}]", index);
        let uuid = extract_str(&body, &["data", index_segment.as_str(), "attributes", "uuid"]);

        if uuid.is_empty() {
            warn!("No backup uuid at data[{}] in backup list", index);
        } else {
            debug!("Backup {} has uuid {}", index, uuid);
        }
        Ok(uuid)
    }

    /// Signed download URL for a backup
    ///
    /// Yields an empty string when the panel omits `attributes.url`.
    pub async fn resolve_download_link(&self, backup_uuid: &str) -> Result<String, PanelError> {
        info!("Requesting download link for backup {}", backup_uuid);

        let body = self
            .get_json(&self.config.download_link_url(backup_uuid))
            .await?;
        let url = extract_str(&body, &["attributes", "url"]);

        if url.is_empty() {
            warn!("No attributes.url in download link response for {}", backup_uuid);
        }
        Ok(url)
    }

    /// Run both calls in order, failing on an empty uuid or URL
    pub async fn resolve_backup_url(&self) -> Result<ResolvedBackup, PanelError> {
        let uuid = self.list_backups().await?;
        if uuid.is_empty() {
            return Err(PanelError::BackupNotFound {
                index: self.config.backup_index,
            });
        }

        let url = self.resolve_download_link(&uuid).await?;
        if url.is_empty() {
            return Err(PanelError::MissingDownloadUrl { uuid });
        }

        Ok(ResolvedBackup { uuid, url })
    }

    /// Every backup of the server, typed
    pub async fn fetch_backups(&self) -> Result<Vec<Backup>, PanelError> {
        let response = self.send(self.authorized(&self.config.backups_url())).await?;
        let list = response.json::<BackupListResponse>().await?;
        Ok(list.into_backups())
    }

    fn authorized(&self, url: &str) -> RequestBuilder {
        debug!("GET {}", url);
        self.client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
    }

    /// Send a request, turning non-2xx responses into `PanelError::Api`
    async fn send(&self, request: RequestBuilder) -> Result<Response, PanelError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(PanelError::Api {
            status: status.as_u16(),
            message: api_error_message(&text),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, PanelError> {
        let response = self.send(self.authorized(url)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|e| {
            warn!("Panel response from {} is not JSON: {}", url, e);
            Value::Null
        }))
    }
}

/// Look up a string along a path of object keys and `[N]` array subscripts
///
/// A subscript only indexes arrays and a plain segment only names object
/// keys. Any miss (absent key, index out of range, non-string leaf) yields
/// an empty string.
pub fn extract_str(value: &Value, path: &[&str]) -> String {
    let mut current = value;
    for segment in path {
        let next = match (current, array_index(segment)) {
            (Value::Array(items), Some(i)) => items.get(i),
            (Value::Object(map), None) => map.get(*segment),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    current.as_str().unwrap_or_default().to_string()
}

/// Parse a `[N]` path segment
fn array_index(segment: &str) -> Option<usize> {
    segment
        .strip_prefix('[')?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// First `errors[].detail` of a panel error body, else the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .map(|v| extract_str(&v, &["errors", "[0]", "detail"]))
        .filter(|detail| !detail.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backups_fixture() -> Value {
        json!({
            "object": "list",
            "data": [
                {"object": "backup", "attributes": {"uuid": "uuid-zero", "name": "first", "bytes": 10}},
                {"object": "backup", "attributes": {"uuid": "uuid-one", "name": "second", "bytes": 20}},
                {"object": "backup", "attributes": {"uuid": "uuid-two", "name": "third", "bytes": 30}}
            ]
        })
    }

    fn client_for(server: &MockServer, index: &str) -> PanelClient {
        let config = PanelConfig::new("srv1", "ptlc_key", index, &server.uri()).unwrap();
        PanelClient::new(build_http_client().unwrap(), config)
    }

    #[test]
    fn test_extract_str_paths() {
        let doc = backups_fixture();
        assert_eq!(extract_str(&doc, &["data", "[2]", "attributes", "uuid"]), "uuid-two");
        assert_eq!(extract_str(&doc, &["data", "[3]", "attributes", "uuid"]), "");
        assert_eq!(extract_str(&doc, &["data", "[x]", "attributes", "uuid"]), "");
        assert_eq!(extract_str(&doc, &["data", "[0]", "attributes", "bytes"]), "");
        assert_eq!(extract_str(&Value::Null, &["attributes", "url"]), "");
    }

    #[test]
    fn test_extract_str_subscripts_only_index_arrays() {
        let keyed = json!({"data": {"1": {"attributes": {"uuid": "from-object"}}}});
        assert_eq!(extract_str(&keyed, &["data", "[1]", "attributes", "uuid"]), "");

        let listed = backups_fixture();
        assert_eq!(extract_str(&listed, &["data", "1", "attributes", "uuid"]), "");
        assert_eq!(extract_str(&listed, &["data", "[1]", "attributes", "uuid"]), "uuid-one");
    }

    #[tokio::test]
    async fn test_list_backups_ignores_keyed_data_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"1": {"attributes": {"uuid": "from-object"}}}
            })))
            .mount(&server)
            .await;

        let uuid = client_for(&server, "1").list_backups().await.unwrap();
        assert_eq!(uuid, "");
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"errors":[{"code":"NotFoundHttpException","status":"404","detail":"The requested resource could not be found."}]}"#;
        assert_eq!(
            api_error_message(body),
            "The requested resource could not be found."
        );
        assert_eq!(api_error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_list_backups_sends_headers_and_picks_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .and(header("Authorization", "Bearer ptlc_key"))
            .and(header("Accept", "application/json"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(backups_fixture()))
            .expect(1)
            .mount(&server)
            .await;

        let uuid = client_for(&server, "1").list_backups().await.unwrap();
        assert_eq!(uuid, "uuid-one");
    }

    #[tokio::test]
    async fn test_list_backups_out_of_range_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(backups_fixture()))
            .mount(&server)
            .await;

        let uuid = client_for(&server, "7").list_backups().await.unwrap();
        assert_eq!(uuid, "");
    }

    #[tokio::test]
    async fn test_list_backups_non_json_body_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let uuid = client_for(&server, "0").list_backups().await.unwrap();
        assert!(uuid.is_empty());
    }

    #[tokio::test]
    async fn test_list_backups_http_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "errors": [{"code": "AccessDeniedHttpException", "status": "403", "detail": "This action is unauthorized."}]
            })))
            .mount(&server)
            .await;

        match client_for(&server, "0").list_backups().await {
            Err(PanelError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "This action is unauthorized.");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_download_link_returns_url_verbatim() {
        let server = MockServer::start().await;
        let signed = "https://node.example.com/download/backup?token=eyJ0eXAi.abc%2Fdef&server=srv1";
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups/uuid-one/download"))
            .and(header("Authorization", "Bearer ptlc_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "signed_url",
                "attributes": {"url": signed}
            })))
            .mount(&server)
            .await;

        let url = client_for(&server, "1")
            .resolve_download_link("uuid-one")
            .await
            .unwrap();
        assert_eq!(url, signed);
    }

    #[tokio::test]
    async fn test_resolve_backup_url_rejects_missing_backup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let result = client_for(&server, "0").resolve_backup_url().await;
        assert!(matches!(result, Err(PanelError::BackupNotFound { index: 0 })));
    }

    #[tokio::test]
    async fn test_resolve_backup_url_rejects_missing_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(backups_fixture()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups/uuid-zero/download"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"attributes": {}})))
            .mount(&server)
            .await;

        match client_for(&server, "0").resolve_backup_url().await {
            Err(PanelError::MissingDownloadUrl { uuid }) => assert_eq!(uuid, "uuid-zero"),
            other => panic!("Expected MissingDownloadUrl, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_backups_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/client/servers/srv1/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(backups_fixture()))
            .mount(&server)
            .await;

        let backups = client_for(&server, "0").fetch_backups().await.unwrap();
        let names: Vec<_> = backups.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        assert_eq!(backups[2].bytes, 30);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let config = PanelConfig::new("srv1", "key", "0", "http://127.0.0.1:1").unwrap();
        let client = PanelClient::new(build_http_client().unwrap(), config);

        let result = client.list_backups().await;
        assert!(matches!(result, Err(PanelError::Network(_))));
    }
}
