//! Request descriptors and the HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use motorcare_types::ApiError;
use reqwest::Method;

use crate::config::ClientConfig;

/// Immutable description of one HTTP request.
///
/// The transport never mutates a descriptor; auth and bookkeeping headers
/// are attached to the outgoing request instead. That is what lets the
/// client resend the same descriptor after a token refresh.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw outcome of a transmitted request: any HTTP response that arrived.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The seam between the client and the network.
///
/// `Ok` means an HTTP response arrived, whatever its status code. `Err` is
/// reserved for transport-level failures, already normalized: 408 for
/// timeouts, 0 for no network path, 500 for anything else.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<RawResponse, ApiError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url_for(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    fn classify(err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::timeout()
        } else if err.is_connect() {
            ApiError::offline()
        } else {
            ApiError::unexpected(format!("Request failed: {}", err))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<RawResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path))
            .header("x-client-version", &self.config.client_version)
            .header(
                "x-request-timestamp",
                chrono::Utc::now().timestamp_millis().to_string(),
            );

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(token) = access_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(Self::classify)?;

        // Non-JSON bodies (HTML error pages, empty 204s) still normalize.
        let body = if text.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };

        Ok(RawResponse { status, body })
    }
}
