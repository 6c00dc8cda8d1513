use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Generation of whole files is slow, so the timeout is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// One JSON POST to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the decoded JSON reply. Non-success
    /// statuses and network failures are [`Error::Transport`]; a success
    /// reply that is not JSON is [`Error::ResponseFormat`].
    async fn post(&self, request: &HttpRequest) -> Result<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(&self, request: &HttpRequest) -> Result<Value> {
        (**self).post(request).await
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &HttpRequest) -> Result<Value> {
        let mut builder = self
            .client
            .post(&request.url)
            .header("content-type", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Transport(format!("API error ({}): {}", status, body)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| Error::ResponseFormat {
            provider: "http",
            cause: format!("Invalid JSON reply: {}", e),
        })
    }
}
