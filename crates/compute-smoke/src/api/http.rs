//! REST adapter for a live compute endpoint
//!
//! Maps each [`ComputeApi`] operation onto the compute v2 REST surface
//! (`/os-security-groups`, `/servers`). Authentication is a pre-issued token
//! sent as `X-Auth-Token`; there is no token negotiation and no retry here.

use super::error::ApiError;
use super::models::{
    ApiResponse, CreateServerRequest, RebootType, SecurityGroup, ServerInstance, ServerSummary,
};
use super::{ApiResult, ComputeApi};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const AUTH_HEADER: &str = "X-Auth-Token";
const SECURITY_GROUPS: &str = "os-security-groups";
const SERVERS: &str = "servers";

/// Thin HTTP client for the compute API
#[derive(Debug, Clone)]
pub struct HttpComputeClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SecurityGroupEnvelope {
    security_group: SecurityGroup,
}

#[derive(Deserialize)]
struct SecurityGroupsEnvelope {
    security_groups: Vec<SecurityGroup>,
}

#[derive(Deserialize)]
struct ServerEnvelope {
    server: ServerInstance,
}

#[derive(Deserialize)]
struct ServersEnvelope {
    servers: Vec<ServerSummary>,
}

impl HttpComputeClient {
    /// Create a client for `base_url` (e.g. `https://compute.example/v2.1`)
    ///
    /// Fails if the endpoint is not an absolute http(s) URL.
    pub fn new(
        base_url: impl AsRef<str>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let invalid = |message: String| ApiError::Transport {
            operation: "build_client",
            message,
        };
        let raw = base_url.as_ref();
        let mut base_url =
            Url::parse(raw).map_err(|e| invalid(format!("invalid endpoint '{raw}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("endpoint '{raw}' is not an http(s) URL")));
        }
        // A trailing slash leaves an empty segment in front of every path
        base_url
            .path_segments_mut()
            .map_err(|()| invalid(format!("endpoint '{raw}' cannot carry a path")))?
            .pop_if_empty();

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` only accepts http(s) URLs, which always take path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Issue a request; returns the status and raw body on 2xx.
    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        path: &[&str],
        body: Option<Value>,
    ) -> Result<(u16, String), ApiError> {
        let url = self.url(path);
        debug!(operation, method = %method, url = %url, "Compute API request");

        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.header(AUTH_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| ApiError::Transport {
            operation,
            message: e.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| ApiError::Transport {
            operation,
            message: e.to_string(),
        })?;

        if status.is_success() {
            Ok((status.as_u16(), text))
        } else {
            Err(ApiError::status(
                operation,
                status.as_u16(),
                fault_message(status, &text),
            ))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        path: &[&str],
        body: Option<Value>,
    ) -> ApiResult<T> {
        let (status, text) = self.send(operation, method, path, body).await?;
        let decoded = serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            operation,
            message: e.to_string(),
        })?;
        Ok(ApiResponse::new(status, decoded))
    }

    async fn send_empty(
        &self,
        operation: &'static str,
        method: Method,
        path: &[&str],
        body: Option<Value>,
    ) -> ApiResult<()> {
        let (status, _) = self.send(operation, method, path, body).await?;
        Ok(ApiResponse::new(status, ()))
    }
}

/// Pull the human-readable message out of a compute fault body.
///
/// Faults look like `{"badRequest": {"message": "...", "code": 400}}`; the
/// wrapper key varies by status, so take the first object's `message`.
fn fault_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.as_object()?
                .values()
                .find_map(|inner| inner.get("message")?.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.trim().to_string()
            }
        })
}

impl ComputeApi for HttpComputeClient {
    async fn create_security_group(&self, name: &str, description: &str) -> ApiResult<SecurityGroup> {
        let body = json!({"security_group": {"name": name, "description": description}});
        let resp: ApiResponse<SecurityGroupEnvelope> = self
            .send_json("create_security_group", Method::POST, &[SECURITY_GROUPS], Some(body))
            .await?;
        Ok(resp.map(|e| e.security_group))
    }

    async fn list_security_groups(&self) -> ApiResult<Vec<SecurityGroup>> {
        let resp: ApiResponse<SecurityGroupsEnvelope> = self
            .send_json("list_security_groups", Method::GET, &[SECURITY_GROUPS], None)
            .await?;
        Ok(resp.map(|e| e.security_groups))
    }

    async fn get_security_group(&self, id: &str) -> ApiResult<SecurityGroup> {
        let resp: ApiResponse<SecurityGroupEnvelope> = self
            .send_json("get_security_group", Method::GET, &[SECURITY_GROUPS, id], None)
            .await?;
        Ok(resp.map(|e| e.security_group))
    }

    async fn update_security_group(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<SecurityGroup> {
        let mut fields = serde_json::Map::new();
        if let Some(name) = name {
            fields.insert("name".to_string(), Value::from(name));
        }
        if let Some(description) = description {
            fields.insert("description".to_string(), Value::from(description));
        }
        let body = json!({"security_group": fields});
        let resp: ApiResponse<SecurityGroupEnvelope> = self
            .send_json("update_security_group", Method::PUT, &[SECURITY_GROUPS, id], Some(body))
            .await?;
        Ok(resp.map(|e| e.security_group))
    }

    async fn delete_security_group(&self, id: &str) -> ApiResult<()> {
        self.send_empty("delete_security_group", Method::DELETE, &[SECURITY_GROUPS, id], None)
            .await
    }

    async fn add_security_group(&self, server_id: &str, group_name: &str) -> ApiResult<()> {
        let body = json!({"addSecurityGroup": {"name": group_name}});
        let path = [SERVERS, server_id, "action"];
        self.send_empty("add_security_group", Method::POST, &path, Some(body))
            .await
    }

    async fn create_server(&self, request: &CreateServerRequest) -> ApiResult<ServerInstance> {
        let body = json!({"server": request});
        let (status, text) = self
            .send("create_server", Method::POST, &[SERVERS], Some(body))
            .await?;

        // The create response only carries the id; status is implicitly BUILD
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        #[derive(Deserialize)]
        struct CreatedEnvelope {
            server: Created,
        }
        let created: CreatedEnvelope =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode {
                operation: "create_server",
                message: e.to_string(),
            })?;

        Ok(ApiResponse::new(
            status,
            ServerInstance {
                id: created.server.id,
                name: request.name.clone(),
                status: compute_smoke_common::ServerStatus::Build,
                security_groups: Vec::new(),
            },
        ))
    }

    async fn get_server(&self, id: &str) -> ApiResult<ServerInstance> {
        let resp: ApiResponse<ServerEnvelope> = self
            .send_json("get_server", Method::GET, &[SERVERS, id], None)
            .await?;
        Ok(resp.map(|e| e.server))
    }

    async fn list_servers(&self) -> ApiResult<Vec<ServerSummary>> {
        let resp: ApiResponse<ServersEnvelope> = self
            .send_json("list_servers", Method::GET, &[SERVERS], None)
            .await?;
        Ok(resp.map(|e| e.servers))
    }

    async fn reboot_server(&self, id: &str, reboot_type: RebootType) -> ApiResult<()> {
        let body = json!({"reboot": {"type": reboot_type}});
        let path = [SERVERS, id, "action"];
        self.send_empty("reboot_server", Method::POST, &path, Some(body))
            .await
    }

    async fn delete_server(&self, id: &str) -> ApiResult<()> {
        self.send_empty("delete_server", Method::DELETE, &[SERVERS, id], None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_message_extracts_nested_message() {
        let body = r#"{"badRequest": {"message": "Security group is still in use", "code": 400}}"#;
        assert_eq!(
            fault_message(StatusCode::BAD_REQUEST, body),
            "Security group is still in use"
        );
    }

    #[test]
    fn test_fault_message_falls_back_to_body_or_reason() {
        assert_eq!(fault_message(StatusCode::NOT_FOUND, "plain text "), "plain text");
        assert_eq!(fault_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    fn client(base_url: &str) -> HttpComputeClient {
        HttpComputeClient::new(base_url, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_ids_are_percent_encoded_as_one_segment() {
        let client = client("http://localhost:8774/v2.1");
        assert_eq!(
            client.url(&[SERVERS, "abc-123", "action"]).as_str(),
            "http://localhost:8774/v2.1/servers/abc-123/action"
        );
        assert_eq!(
            client.url(&[SECURITY_GROUPS, "a b/c"]).as_str(),
            "http://localhost:8774/v2.1/os-security-groups/a%20b%2Fc"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client("http://localhost:8774/v2.1/");
        assert_eq!(client.base_url().as_str(), "http://localhost:8774/v2.1");
        assert_eq!(
            client.url(&[SERVERS]).as_str(),
            "http://localhost:8774/v2.1/servers"
        );
    }

    #[test]
    fn test_bare_host_endpoint() {
        let client = client("https://compute.example");
        assert_eq!(
            client.url(&[SECURITY_GROUPS]).as_str(),
            "https://compute.example/os-security-groups"
        );
    }

    #[test]
    fn test_rejects_unusable_endpoints() {
        for endpoint in ["compute.example/v2.1", "not a url", "mailto:ops@example.com"] {
            let err = HttpComputeClient::new(endpoint, None, Duration::from_secs(5)).unwrap_err();
            assert!(err.is_transport(), "{endpoint}: {err:?}");
            assert_eq!(err.operation(), "build_client");
        }
    }
}
