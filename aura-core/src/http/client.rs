//! HTTP client implementation using reqwest

use crate::config::ConnectionConfig;
use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use crate::providers::error::{AdapterError, AdapterResult};
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("aura-gateway/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(&ConnectionConfig::default())
    }

    /// Create a new HTTP client from connection settings
    pub fn with_config(config: &ConnectionConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// POST a JSON body and decode the JSON reply
    ///
    /// The call races `cancel`: once the token fires the request future is
    /// dropped, which closes the underlying connection, and a `Timeout`
    /// failure is returned.
    pub async fn post_json<B, R>(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        options: &RequestOptions,
        cancel: &CancellationToken,
    ) -> AdapterResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let request_id = options.request_id;
        debug!(provider, %request_id, url, "Sending backend request");

        let mut req_builder = self
            .client
            .post(url)
            .timeout(options.timeout)
            .header("X-Request-ID", request_id.to_string())
            .json(body);

        for (key, value) in headers {
            req_builder = req_builder.header(*key, value.as_str());
        }

        let exchange = async {
            let response = req_builder.send().await.map_err(|e| {
                let mapped = AdapterError::from(e);
                warn!(provider, %request_id, error = %mapped, "Backend request failed");
                mapped
            })?;

            let status = response.status();
            debug!(provider, %request_id, %status, "Backend responded");

            if !status.is_success() {
                let headers = response.headers().clone();
                let body = response.text().await.ok();
                warn!(provider, %request_id, %status, "Backend returned error status");
                return Err(map_http_error(status, Some(&headers), body, request_id));
            }

            Self::validate_content_type(&response)?;
            self.check_content_length(&response)?;

            let text = response.text().await.map_err(|e| {
                AdapterError::transient(format!(
                    "Failed to read response body: {} [request_id: {}]",
                    e, request_id
                ))
            })?;

            if text.len() > self.max_response_size {
                return Err(AdapterError::transient(format!(
                    "Response size {} exceeds maximum {} [request_id: {}]",
                    text.len(),
                    self.max_response_size,
                    request_id
                )));
            }

            serde_json::from_str::<R>(&text).map_err(|e| {
                error!(provider, %request_id, error = %e, "Failed to parse backend response");
                AdapterError::transient(format!(
                    "Invalid response format: {} [request_id: {}]",
                    e, request_id
                ))
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(provider, %request_id, "Backend request cancelled");
                Err(AdapterError::timeout(format!(
                    "Request cancelled before completion [request_id: {}]",
                    request_id
                )))
            }
            result = exchange => result,
        }
    }

    /// Validate response content type
    fn validate_content_type(response: &Response) -> AdapterResult<()> {
        if let Some(content_type) = response.headers().get("content-type") {
            let content_type_str = content_type.to_str().unwrap_or("").to_lowercase();

            if !content_type_str.contains("application/json") {
                return Err(AdapterError::transient(format!(
                    "Expected application/json, got: {}",
                    content_type_str
                )));
            }
        }

        Ok(())
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> AdapterResult<()> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(AdapterError::transient(format!(
                    "Response size {} exceeds maximum {}",
                    content_length, self.max_response_size
                )));
            }
        }

        Ok(())
    }
}
