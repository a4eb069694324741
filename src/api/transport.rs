//! HTTP transport seam.
//!
//! The gateway speaks to the backend through [`Transport`] so that tests can
//! script responses with [`MockTransport`] instead of running a server.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::{Endpoint, Method};

/// Body of an outgoing request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Single file upload plus plain text fields
    Multipart {
        field: String,
        file_name: String,
        bytes: Vec<u8>,
        fields: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub endpoint: Endpoint,
    pub method: Method,
    pub path: String,
    /// Query parameters in order; repeated keys are sent repeatedly
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl BackendRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method: endpoint.method(),
            path: endpoint.path().to_string(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// First value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated query parameter
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: value.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportFailure {
    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Network(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, TransportFailure>;

    /// Absolute URL for a path, for links handed to the user
    fn url(&self, path: &str) -> String;
}

/// reqwest-backed transport against a live backend
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, TransportFailure> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportFailure::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_error(&self, err: &reqwest::Error) -> TransportFailure {
        if err.is_timeout() {
            TransportFailure::Timeout(self.timeout_secs)
        } else {
            TransportFailure::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, TransportFailure> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart {
                field,
                file_name,
                bytes,
                fields,
            } => {
                let mut form = Form::new().part(field, Part::bytes(bytes).file_name(file_name));
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(|e| self.map_error(&e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| self.map_error(&e))?;

        Ok(BackendResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Scripted transport for tests.
///
/// Responses are queued per endpoint and served in order; an endpoint with
/// nothing queued answers with a network failure. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<Endpoint, VecDeque<Result<BackendResponse, TransportFailure>>>>>,
    /// Every request sent, in order
    pub request_log: Arc<Mutex<Vec<BackendRequest>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to hold a request in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, endpoint: Endpoint, status: u16, body: &Value) {
        self.push(endpoint, Ok(BackendResponse::json(status, body)));
    }

    pub fn respond_raw(&self, endpoint: Endpoint, status: u16, body: impl Into<Vec<u8>>) {
        self.push(endpoint, Ok(BackendResponse::new(status, body)));
    }

    pub fn fail(&self, endpoint: Endpoint, failure: TransportFailure) {
        self.push(endpoint, Err(failure));
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.request_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.request_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn push(&self, endpoint: Endpoint, response: Result<BackendResponse, TransportFailure>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(endpoint)
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, TransportFailure> {
        let endpoint = request.endpoint;
        self.request_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportFailure::Network(format!(
                    "no mock response for {}",
                    endpoint
                )))
            })
    }

    fn url(&self, path: &str) -> String {
        format!("http://mock{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder_keeps_repeated_query() {
        let request = BackendRequest::new(Endpoint::Train)
            .with_query("session_id", "abc")
            .with_query("models", "A")
            .with_query("models", "B");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/api/models/models");
        assert_eq!(request.query_value("session_id"), Some("abc"));
        assert_eq!(request.query_values("models"), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_mock_serves_in_order_and_logs() {
        let mock = MockTransport::new();
        mock.respond(Endpoint::Eda, 200, &json!({"n": 1}));
        mock.respond(Endpoint::Eda, 500, &json!({"n": 2}));

        let first = mock.send(BackendRequest::new(Endpoint::Eda)).await.unwrap();
        let second = mock.send(BackendRequest::new(Endpoint::Eda)).await.unwrap();
        assert!(first.is_success());
        assert!(!second.is_success());

        let third = mock.send(BackendRequest::new(Endpoint::Eda)).await;
        assert!(matches!(third, Err(TransportFailure::Network(_))));
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn test_http_transport_trims_base_url() {
        let transport = HttpTransport::new("http://localhost:8000/", 5, "test").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
        assert_eq!(
            transport.url("/api/eda/analyze"),
            "http://localhost:8000/api/eda/analyze"
        );
    }
}
