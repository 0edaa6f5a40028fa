//! In-process fake API for tests
//!
//! Each test builds the routes it needs on an axum `Router`; the fake mounts
//! them under `/api/v1`, binds 127.0.0.1:0 and records every request it sees.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;

use crate::storage::{MemoryStorage, SharedStorage};
use crate::transport::Transport;

const API_PREFIX: &str = "/api/v1";

/// What the fake saw for one request
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    /// Path relative to the API prefix, e.g. `/defects/7`
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

pub(crate) struct FakeApi {
    addr: SocketAddr,
    log: Log,
    _server: tokio::task::JoinHandle<()>,
}

async fn record(State(log): State<Log>, request: Request, next: Next) -> Response {
    // Nothing borrowed from `request` may live across the await below
    let entry = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Recorded {
            method: request.method().to_string(),
            path: request
                .uri()
                .path()
                .trim_start_matches(API_PREFIX)
                .to_string(),
            query: request.uri().query().map(str::to_string),
            authorization: header("authorization"),
            content_type: header("content-type"),
        }
    };
    log.lock().unwrap().push(entry);
    next.run(request).await
}

impl FakeApi {
    pub async fn start<F>(build: F) -> Self
    where
        F: FnOnce(Router) -> Router,
    {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .nest(API_PREFIX, build(Router::new()))
            .layer(middleware::from_fn_with_state(log.clone(), record));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            log,
            _server: server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, API_PREFIX)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    /// Requests matching method and path
    pub fn calls(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Transport pointed at this fake, plus the storage it reads tokens from
    pub fn transport(&self) -> (Arc<Transport>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let shared: SharedStorage = storage.clone();
        let transport = Transport::new(self.base_url(), shared).unwrap();
        (Arc::new(transport), storage)
    }
}

/// Session response body as the auth endpoints return it
pub(crate) fn session_json(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "accessToken": access,
        "refreshToken": refresh,
        "refreshExpiresAt": "2030-01-01T00:00:00Z",
        "user": {
            "id": "u1",
            "email": "engineer@site.example",
            "fullName": "Site Engineer",
            "role": "engineer"
        }
    })
}

/// Request bodies captured by a handler
pub(crate) type Bodies = Arc<Mutex<Vec<serde_json::Value>>>;

pub(crate) fn bodies() -> Bodies {
    Arc::new(Mutex::new(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SessionStorage, ACCESS_TOKEN_KEY};
    use axum::routing::get;

    #[tokio::test]
    async fn test_records_method_path_and_headers() {
        let api = FakeApi::start(|r| r.route("/ping", get(|| async { "pong" }))).await;
        let (transport, storage) = api.transport();
        storage.set(ACCESS_TOKEN_KEY, "a1").unwrap();

        transport.ping().await.unwrap();

        let calls = api.calls("GET", "/ping");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer a1"));
        assert_eq!(calls[0].query, None);
    }
}
