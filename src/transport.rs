//! API Transport
//!
//! The network primitive the engine treats as a black box: one request in, one decoded
//! JSON document (or an error) out. [`HttpTransport`] is the `reqwest` implementation.

use crate::config::ApiConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

/// Header naming the primary chain's root path
pub const PATH_HEADER: &str = "path";
/// Header carrying comma-joined preload hints
pub const PRELOAD_HEADER: &str = "preload";

/// One API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Network primitive
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `request.path` and decode the JSON body.
    async fn fetch(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

/// HTTP transport backed by `reqwest`
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn map_http_error(error: reqwest::Error) -> TransportError {
    if let Some(status) = error.status() {
        TransportError::Status {
            status: status.as_u16(),
            message: error.to_string(),
        }
    } else if error.is_timeout() {
        TransportError::Network(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        TransportError::Network(format!("Connection error: {}", error))
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else {
        TransportError::Network(format!("HTTP error: {}", error))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        trace!(url = %url, headers = ?request.headers, "API request");
        let mut builder = self.client.get(&url).header("Accept", "application/ld+json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(format!("Failed to parse response: {}", e)))
    }
}
