//! Remote API client
//!
//! Every remote operation is multiplexed through a single POST endpoint and
//! selected by the `requestType` field. The client builds that envelope,
//! sends it through a [`Transport`], and classifies the JSON answer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT_CHARSET, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::error::{PolicyReportError, Result};
use crate::settings::Settings;

/// API path appended to the configured base URL.
pub const API_PATH: &str = "/api/v1.3";

/// Agent identification sent with every request.
pub const AGENT_NAME: &str = "ps-policy-report";
pub const AGENT_VERSION: &str = "0.1.0";

/// Extra field asking the remote to merge org and product policies into a
/// project's answer.
pub const AGGREGATE_POLICIES: &str = "aggregatePolicies";

/// Error text the remote uses for a busy resource; not a failure.
const SOFT_FAILURE_MARKER: &str = "occupied";

/// The fixed set of remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    OrganizationDetails,
    OrganizationProductVitals,
    OrganizationProjectVitals,
    ProductProjectVitals,
    ProjectPolicies,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::OrganizationDetails => "getOrganizationDetails",
            RequestKind::OrganizationProductVitals => "getOrganizationProductVitals",
            RequestKind::OrganizationProjectVitals => "getOrganizationProjectVitals",
            RequestKind::ProductProjectVitals => "getProductProjectVitals",
            RequestKind::ProjectPolicies => "getProjectPolicies",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which envelope field carries the authenticating token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    UserKey,
    Org,
    Product,
    Project,
}

impl TokenKind {
    pub fn field_name(self) -> &'static str {
        match self {
            TokenKind::UserKey => "userKey",
            TokenKind::Org => "orgToken",
            TokenKind::Product => "productToken",
            TokenKind::Project => "projectToken",
        }
    }
}

/// Sends one request envelope and returns the parsed JSON body.
///
/// Implement this to plug in the HTTP endpoint or in-memory test stubs.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: &Value) -> Result<Value>;
}

/// reqwest-backed transport for the remote API.
pub struct HttpTransport {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for `ws_url` (the base URL without the API path).
    pub fn new(ws_url: &str) -> Result<Self> {
        let http_client = Self::client_builder().build()?;
        Ok(Self::with_client(ws_url, http_client))
    }

    /// Transport over a caller-built client, normally one derived from
    /// [`HttpTransport::client_builder`].
    pub fn with_client(ws_url: &str, http_client: reqwest::Client) -> Self {
        HttpTransport {
            endpoint: format!("{}{}", ws_url.trim_end_matches('/'), API_PATH),
            http_client,
        }
    }

    /// Client builder carrying the agent's user agent.
    pub fn client_builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(format!("{}/{}", AGENT_NAME, env!("CARGO_PKG_VERSION")))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: &Value) -> Result<Value> {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_CHARSET, "utf-8")
            .body(payload)
            .send()
            .await?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| PolicyReportError::Protocol(format!("response is not valid JSON: {e}")))
    }
}

/// Authenticated client for the remote API.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    user_key: String,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, user_key: impl Into<String>) -> Self {
        Self {
            transport,
            user_key: user_key.into(),
        }
    }

    /// Client talking HTTP to the configured base URL.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = HttpTransport::new(&settings.ws_url)?;
        Ok(Self::new(Arc::new(transport), settings.user_key.clone()))
    }

    /// Build the request envelope. Extra fields are applied last and may
    /// override envelope fields.
    pub fn envelope(
        &self,
        kind: RequestKind,
        token_kind: TokenKind,
        token: &str,
        extra: Option<&Map<String, Value>>,
    ) -> Value {
        let mut body = Map::new();
        body.insert(
            "agentInfo".to_string(),
            json!({ "agent": AGENT_NAME, "agentVersion": AGENT_VERSION }),
        );
        body.insert("requestType".to_string(), Value::from(kind.as_str()));
        body.insert("userKey".to_string(), Value::from(self.user_key.as_str()));
        body.insert(token_kind.field_name().to_string(), Value::from(token));
        if let Some(extra) = extra {
            for (key, value) in extra {
                body.insert(key.clone(), value.clone());
            }
        }
        Value::Object(body)
    }

    /// Issue one request and classify the response.
    pub async fn call(
        &self,
        kind: RequestKind,
        token_kind: TokenKind,
        token: &str,
        extra: Option<Map<String, Value>>,
    ) -> Result<Value> {
        debug!("Using '{}' API", kind);
        let body = self.envelope(kind, token_kind, token, extra.as_ref());
        let response = self.transport.post(&body).await?;
        debug!("Finish using '{}' API", kind);

        check_response(kind, &response)?;
        Ok(response)
    }
}

/// Classify a response body.
///
/// `errorCode` is a failure. `errorMessage` is a failure unless it reports an
/// occupied resource, which also clears a co-present `errorCode`.
pub fn check_response(kind: RequestKind, response: &Value) -> Result<()> {
    let error_code = response.get("errorCode").map(value_text);
    let error_message = response.get("errorMessage").map(value_text);

    let mut failed = false;
    if let Some(code) = &error_code {
        error!(request = %kind, "Error code: {}", code);
        failed = true;
    }
    if let Some(message) = &error_message {
        if message.contains(SOFT_FAILURE_MARKER) {
            debug!(request = %kind, "remote resource occupied, continuing: {}", message);
            failed = false;
        } else {
            error!(request = %kind, "Error message: {}", message);
            failed = true;
        }
    }

    if failed {
        error!("Status: FAILURE");
        return Err(PolicyReportError::Remote {
            request: kind.as_str().to_string(),
            error_code,
            error_message,
        });
    }
    Ok(())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingTransport {
        reply: Value,
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn post(&self, body: &Value) -> Result<Value> {
            self.seen.lock().unwrap().push(body.clone());
            Ok(self.reply.clone())
        }
    }

    fn recording(reply: Value) -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_envelope_shape() {
        let client = RemoteClient::new(recording(json!({})), "user-key-1");
        let mut extra = Map::new();
        extra.insert(AGGREGATE_POLICIES.to_string(), Value::from("true"));

        let body = client.envelope(
            RequestKind::ProjectPolicies,
            TokenKind::Project,
            "proj-1",
            Some(&extra),
        );

        assert_eq!(body["agentInfo"]["agent"], "ps-policy-report");
        assert_eq!(body["agentInfo"]["agentVersion"], "0.1.0");
        assert_eq!(body["requestType"], "getProjectPolicies");
        assert_eq!(body["userKey"], "user-key-1");
        assert_eq!(body["projectToken"], "proj-1");
        assert_eq!(body["aggregatePolicies"], "true");
    }

    #[test]
    fn test_error_code_is_failure() {
        let res = check_response(
            RequestKind::OrganizationDetails,
            &json!({"errorCode": 5001}),
        );
        match res {
            Err(PolicyReportError::Remote { error_code, .. }) => {
                assert_eq!(error_code.as_deref(), Some("5001"))
            }
            other => panic!("expected remote failure, got {:?}", other),
        }
    }

    #[test]
    fn test_occupied_message_is_soft_failure() {
        let res = check_response(
            RequestKind::ProjectPolicies,
            &json!({"errorMessage": "resource occupied, retry later"}),
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_occupied_message_clears_error_code() {
        let res = check_response(
            RequestKind::ProjectPolicies,
            &json!({"errorCode": 3000, "errorMessage": "project is occupied"}),
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_other_message_is_hard_failure() {
        let res = check_response(
            RequestKind::ProjectPolicies,
            &json!({"errorMessage": "invalid token"}),
        );
        assert!(matches!(res, Err(PolicyReportError::Remote { .. })));
    }

    #[tokio::test]
    async fn test_call_sends_envelope_and_returns_body() {
        let transport = recording(json!({"orgName": "Acme"}));
        let client = RemoteClient::new(transport.clone(), "uk");

        let body = client
            .call(RequestKind::OrganizationDetails, TokenKind::Org, "org-1", None)
            .await
            .unwrap();

        assert_eq!(body["orgName"], "Acme");
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["orgToken"], "org-1");
        assert_eq!(seen[0]["requestType"], "getOrganizationDetails");
    }

    #[test]
    fn test_http_transport_endpoint() {
        let transport = HttpTransport::new("https://saas.example.com/").unwrap();
        assert_eq!(transport.endpoint(), "https://saas.example.com/api/v1.3");
    }

    fn local_transport(base_url: &str) -> HttpTransport {
        let http_client = HttpTransport::client_builder().no_proxy().build().unwrap();
        HttpTransport::with_client(base_url, http_client)
    }

    /// Accept one connection, capture the raw request and answer with `reply`.
    async fn serve_once(
        content_type: &'static str,
        reply: &'static str,
    ) -> (String, tokio::task::JoinHandle<(String, Vec<u8>)>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            let (head, body) = loop {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before the request completed");
                raw.extend_from_slice(&buf[..n]);
                let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break (head, raw[end + 4..end + 4 + length].to_vec());
                }
            };

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                content_type,
                reply.len(),
                reply
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            (head, body)
        });

        (base_url, handle)
    }

    #[tokio::test]
    async fn test_http_transport_posts_json_envelope() {
        let (base_url, server) = serve_once("application/json", r#"{"orgName":"Acme"}"#).await;
        let transport = local_transport(&base_url);
        let client = RemoteClient::new(Arc::new(transport), "uk");

        let reply = client
            .call(RequestKind::OrganizationDetails, TokenKind::Org, "org-1", None)
            .await
            .unwrap();
        assert_eq!(reply["orgName"], "Acme");

        let (head, body) = server.await.unwrap();
        assert!(head.starts_with("post /api/v1.3 http/1.1"), "request line: {head}");
        assert!(head.contains("content-type: application/json"));
        assert!(head.contains("accept-charset: utf-8"));
        assert!(head.contains(&format!(
            "user-agent: {}/{}",
            AGENT_NAME,
            env!("CARGO_PKG_VERSION")
        )));

        let sent: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(sent["requestType"], "getOrganizationDetails");
        assert_eq!(sent["userKey"], "uk");
        assert_eq!(sent["orgToken"], "org-1");
        assert_eq!(sent["agentInfo"]["agent"], AGENT_NAME);
    }

    #[tokio::test]
    async fn test_http_transport_non_json_body_is_protocol_error() {
        let (base_url, server) =
            serve_once("text/html", "<html><body>maintenance</body></html>").await;
        let transport = local_transport(&base_url);

        let res = transport.post(&json!({"requestType": "getOrganizationDetails"})).await;
        assert!(matches!(res, Err(PolicyReportError::Protocol(_))), "got {res:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_transport_refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let transport = local_transport(&base_url);
        let res = transport.post(&json!({})).await;
        assert!(matches!(res, Err(PolicyReportError::Transport(_))), "got {res:?}");
    }
}
