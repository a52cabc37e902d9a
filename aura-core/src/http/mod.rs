//! HTTP client module for making API requests to LLM backends
//!
//! This module implements the outbound HTTP layer shared by every adapter:
//! - Connection pooling and client management
//! - Cooperative cancellation of in-flight calls
//! - Error mapping into adapter failure kinds
//! - Request ID generation and correlation

pub mod client;
pub mod error;

use std::time::Duration;
use uuid::Uuid;

pub use client::HttpClient;

/// Options for an outbound HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Per-request timeout; the dispatcher sets this to the remaining budget
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Reuse an existing correlation ID
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}
