//! HTTP transport for the defect-tracker API
//!
//! One `reqwest::Client` per process. Every request:
//! - reads the access token from session storage and sends `Authorization: Bearer <token>`
//!   when one is present (the server decides whether an endpoint needs it)
//! - gives up after a fixed 5 second timeout
//! - turns non-2xx responses into `ApiError::Http` carrying the server's `message`
//! - logs failures, never retries

mod upload;

pub use upload::UploadFile;

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::storage::{SharedStorage, ACCESS_TOKEN_KEY};

/// Fixed request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Optional parts of a request
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Query string parameters
    pub params: Vec<(String, String)>,
    /// JSON body
    pub body: Option<serde_json::Value>,
    /// Single-file multipart body (sent as the `file` field)
    pub multipart: Option<UploadFile>,
}

impl RequestOptions {
    pub fn query(params: Vec<(String, String)>) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn json<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to encode body: {}", e)))?;
        Ok(Self {
            body: Some(body),
            ..Default::default()
        })
    }

    pub fn upload(file: UploadFile) -> Self {
        Self {
            multipart: Some(file),
            ..Default::default()
        }
    }
}

/// A successful (2xx) response with its body fully read
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    body: Vec<u8>,
}

impl Response {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Authorized HTTP client bound to one API base URL
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    base: reqwest::Url,
    storage: SharedStorage,
    timeout: Duration,
}

impl Transport {
    /// Create a transport with the standard 5 second timeout
    pub fn new(base_url: impl Into<String>, storage: SharedStorage) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, storage, REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom timeout (tests use short ones)
    pub fn with_timeout(
        base_url: impl Into<String>,
        storage: SharedStorage,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let base = reqwest::Url::parse(&base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("bad base URL {:?}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "bad base URL {:?}: not a hierarchical URL",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            base,
            storage,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request path built from raw segments, each one percent-encoded
    ///
    /// `path(&["defects", "a/b"])` is `/defects/a%2Fb`, so ids can never
    /// escape into another endpoint.
    pub fn path(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.clear().extend(segments);
        }
        url.path().to_string()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Current access token, if any
    ///
    /// A storage failure is logged and treated as "no token": the request
    /// still goes out and the server decides.
    fn bearer_token(&self) -> Option<String> {
        match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Could not read access token: {}", e);
                None
            }
        }
    }

    fn classify(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Send a request and return the 2xx response
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        let mut request = self.client.request(method.clone(), &url);

        if let Some(token) = self.bearer_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if !options.params.is_empty() {
            request = request.query(&options.params);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }
        if let Some(file) = options.multipart {
            request = request.multipart(file.into_form()?);
        }

        tracing::debug!("{} {}", method, url);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = self.classify(e);
                tracing::error!("API error {} {}: {}", method, path, err);
                return Err(err);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => {
                let err = self.classify(e);
                tracing::error!("API error {} {}: {}", method, path, err);
                return Err(err);
            }
        };

        if !status.is_success() {
            let body_text = String::from_utf8_lossy(&body).into_owned();
            tracing::error!(
                "API error {} {}: {} {}",
                method,
                path,
                status.as_u16(),
                body_text
            );
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: extract_message(&body),
                body: body_text,
            });
        }

        Ok(Response {
            status: status.as_u16(),
            body,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.send(Method::GET, path, RequestOptions::query(params))
            .await?
            .json()
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::POST, path, RequestOptions::json(body)?)
            .await?
            .json()
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PATCH, path, RequestOptions::json(body)?)
            .await?
            .json()
    }

    /// POST a body and ignore whatever comes back
    pub async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.send(Method::POST, path, RequestOptions::json(body)?)
            .await
            .map(|_| ())
    }

    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file: UploadFile,
    ) -> Result<T, ApiError> {
        self.send(Method::POST, path, RequestOptions::upload(file))
            .await?
            .json()
    }

    /// `GET /ping` health check
    pub async fn ping(&self) -> Result<(), ApiError> {
        self.send(Method::GET, "/ping", RequestOptions::default())
            .await
            .map(|_| ())
    }
}

/// Pull `message` out of a JSON error body
fn extract_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, SessionStorage};
    use crate::testing::{FakeApi, Recorded};
    use axum::http::StatusCode;
    use axum::Json;
    use std::sync::Arc;

    #[test]
    fn test_extract_message() {
        assert_eq!(
            extract_message(br#"{"message":"Defect not found"}"#).as_deref(),
            Some("Defect not found")
        );
        assert_eq!(extract_message(br#"{"error":"x"}"#), None);
        assert_eq!(extract_message(b"<html>502</html>"), None);
        assert_eq!(extract_message(br#"{"message":""}"#), None);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        assert!(matches!(
            Transport::new("not a url", storage.clone()),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            Transport::new("mailto:qa@site.example", storage),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_path_segments_are_percent_encoded() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let transport = Transport::new("http://localhost:8080/api/v1", storage).unwrap();

        assert_eq!(transport.path(&["defects", "7"]), "/defects/7");
        assert_eq!(
            transport.path(&["defects", "a/b?x", "comments"]),
            "/defects/a%2Fb%3Fx/comments"
        );
        assert_eq!(
            transport.path(&["defects", "с пробелом"]),
            "/defects/%D1%81%20%D0%BF%D1%80%D0%BE%D0%B1%D0%B5%D0%BB%D0%BE%D0%BC"
        );
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached_when_present() {
        let api = FakeApi::start(|router| {
            router.route(
                "/ping",
                axum::routing::get(|| async { Json(serde_json::json!({"message": "pong"})) }),
            )
        })
        .await;

        let storage = Arc::new(MemoryStorage::new());
        let transport = Transport::new(api.base_url(), storage.clone()).unwrap();

        transport.ping().await.unwrap();
        storage.set(ACCESS_TOKEN_KEY, "tok-1").unwrap();
        transport.ping().await.unwrap();

        let calls: Vec<Recorded> = api.requests();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].authorization, None);
        assert_eq!(calls[1].authorization.as_deref(), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn test_non_2xx_carries_status_and_message() {
        let api = FakeApi::start(|router| {
            router.route(
                "/defects/:id",
                axum::routing::get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(serde_json::json!({"message": "Дефект не найден"})),
                    )
                }),
            )
        })
        .await;

        let transport = Transport::new(api.base_url(), Arc::new(MemoryStorage::new())).unwrap();
        let err = transport
            .get_json::<serde_json::Value>("/defects/404", Vec::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(err.server_message(), Some("Дефект не найден"));
    }

    #[tokio::test]
    async fn test_query_params_are_forwarded() {
        let api = FakeApi::start(|router| {
            router.route(
                "/defects",
                axum::routing::get(|| async { Json(serde_json::json!({"items": []})) }),
            )
        })
        .await;

        let transport = Transport::new(api.base_url(), Arc::new(MemoryStorage::new())).unwrap();
        let _: serde_json::Value = transport
            .get_json(
                "/defects",
                vec![("status".to_string(), "OPEN".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(api.requests()[0].query.as_deref(), Some("status=OPEN"));
    }

    #[tokio::test]
    async fn test_timeout_has_no_status() {
        let api = FakeApi::start(|router| {
            router.route(
                "/ping",
                axum::routing::get(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    "late"
                }),
            )
        })
        .await;

        let transport = Transport::with_timeout(
            api.base_url(),
            Arc::new(MemoryStorage::new()),
            Duration::from_millis(50),
        )
        .unwrap();

        let err = transport.ping().await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout { timeout_ms: 50 }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = Transport::new(
            format!("http://{}/api/v1", addr),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap();

        let err = transport.ping().await.unwrap_err();
        assert!(err.is_network());
    }
}
