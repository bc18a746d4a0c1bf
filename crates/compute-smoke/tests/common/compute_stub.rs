//! Local HTTP stand-in for a compute endpoint
//!
//! Serves canned responses keyed by method and path and records every request
//! it receives, so client tests can assert on the exact wire traffic.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use compute_smoke::api::HttpComputeClient;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Path prefix the stub serves under, like a versioned compute endpoint
pub const API_PREFIX: &str = "/v2.1";

pub const TEST_TOKEN: &str = "stub-token";

/// A request as the stub saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Raw (still percent-encoded) path
    pub path: String,
    pub token: Option<String>,
    pub body: Option<Value>,
}

type Routes = HashMap<(Method, String), (StatusCode, String)>;

#[derive(Clone, Default)]
struct StubState {
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Running stub server; stops when dropped
pub struct ComputeStub {
    base_url: String,
    state: StubState,
    server: JoinHandle<()>,
}

impl ComputeStub {
    pub async fn start() -> Self {
        let state = StubState::default();
        let app = Router::<StubState>::new()
            .fallback(handle)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("stub should bind");
        let addr = listener.local_addr().expect("stub should have an address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}{API_PREFIX}"),
            state,
            server,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client pointed at the stub, sending [`TEST_TOKEN`]
    pub fn client(&self) -> HttpComputeClient {
        HttpComputeClient::new(
            &self.base_url,
            Some(TEST_TOKEN.to_string()),
            Duration::from_secs(5),
        )
        .expect("stub client should build")
    }

    /// Answer `method path` (relative to [`API_PREFIX`]) with a JSON body
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, body.to_string());
    }

    /// Answer `method path` with a body sent as is
    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: impl Into<String>) {
        let status = StatusCode::from_u16(status).expect("valid status code");
        self.state
            .routes
            .lock()
            .unwrap()
            .insert((method, format!("{API_PREFIX}{path}")), (status, body.into()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The only request received so far
    pub fn single_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "{requests:?}");
        requests[0].clone()
    }
}

impl Drop for ComputeStub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        token: headers
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).ok(),
    });

    let (status, body) = state
        .routes
        .lock()
        .unwrap()
        .get(&(method, path))
        .cloned()
        .unwrap_or_else(|| {
            let fault = json!({"itemNotFound": {"message": "No such resource", "code": 404}});
            (StatusCode::NOT_FOUND, fault.to_string())
        });
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}
