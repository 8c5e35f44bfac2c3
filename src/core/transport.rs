//! HTTP Transport
//!
//! HTTP client interface and implementations for token endpoint requests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigurationError, RenewalError};

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Form-encoded request body.
    pub body: String,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (lowercased names).
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Parse a `retry-after` header given in seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// HTTP transport interface (for dependency injection).
///
/// Only POST is needed: the refresh grant is the single call this crate makes.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a POST request.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, RenewalError>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create transport with default settings (30s timeout, 1MB responses).
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::with_options(Duration::from_secs(30), 1048576)
    }

    /// Create transport with custom options.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built, e.g. when the TLS backend
    /// cannot be initialized.
    pub fn with_options(
        timeout: Duration,
        max_response_size: usize,
    ) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
            max_response_size,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, RenewalError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = self.client.post(&request.url);
        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        let response = req_builder
            .body(request.body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenewalError::transient(format!("Request timeout after {:?}", timeout))
                } else {
                    RenewalError::transient(format!("Connection failed: {}", e))
                }
            })?;

        let status = response.status().as_u16();

        if (300..400).contains(&status) {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(RenewalError::InvalidResponse {
                message: format!("Unexpected redirect to: {}", location),
            });
        }

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string().to_lowercase(), v.to_string());
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_response_size {
                return Err(RenewalError::InvalidResponse {
                    message: format!("Response too large: {} bytes", len),
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| RenewalError::transient(format!("Failed to read body: {}", e)))?;

        if body.len() > self.max_response_size {
            return Err(RenewalError::InvalidResponse {
                message: format!("Response too large: {} bytes", body.len()),
            });
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Mock HTTP transport for testing.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: Mutex<Vec<Result<HttpResponse, RenewalError>>>,
    request_history: Mutex<Vec<HttpRequest>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response. Responses are returned in queue order.
    pub fn queue_json_response(&self, status: u16, body: serde_json::Value) -> &Self {
        self.responses.lock().push(Ok(HttpResponse {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: body.to_string(),
        }));
        self
    }

    /// Queue a raw response.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.responses.lock().push(Ok(response));
        self
    }

    /// Queue a transport-level failure.
    pub fn queue_error(&self, error: RenewalError) -> &Self {
        self.responses.lock().push(Err(error));
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, RenewalError> {
        self.request_history.lock().push(request);

        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Err(RenewalError::transient("No mock response available"));
        }
        responses.remove(0)
    }
}
