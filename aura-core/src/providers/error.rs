//! Adapter error types and classification
//!
//! Every backend failure is mapped into one of four [`FailureKind`]s before
//! it leaves an adapter. The dispatcher and the health policy only ever see
//! these kinds, never transport or SDK errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// How a failed attempt is treated by fallback and health tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network trouble, 5xx, overloaded backend
    Transient,
    /// The request itself is unacceptable to this backend (4xx, auth, model)
    Permanent,
    /// The backend asked us to back off
    RateLimited,
    /// The time budget ran out or the backend timed out
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "transient error",
            Self::Permanent => "permanent error",
            Self::RateLimited => "rate limited",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// The only error type an adapter may return
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: FailureKind,
    pub message: String,
    /// Backend-provided back-off hint, if any
    pub retry_after: Option<Duration>,
}

impl AdapterError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Permanent, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(FailureKind::RateLimited, message)
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            AdapterError::transient(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            AdapterError::transient(format!("Failed to decode response: {}", err))
        } else if let Some(status) = err.status() {
            crate::http::error::classify_status(status.as_u16(), err.to_string(), None)
        } else {
            AdapterError::transient(format!("Network error: {}", err))
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::transient(format!("Failed to parse response: {}", err))
    }
}

/// Map backend error message text to a failure kind
///
/// Used when a backend reports an error inside an otherwise successful
/// response, or when the status code alone is ambiguous.
pub fn classify_message(message: &str) -> Option<FailureKind> {
    let lower = message.to_lowercase();

    if lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("insufficient_quota")
        || lower.contains("resource_exhausted")
    {
        return Some(FailureKind::RateLimited);
    }

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
        return Some(FailureKind::Timeout);
    }

    // Anthropic reports "overloaded_error", Gemini "UNAVAILABLE"
    if lower.contains("overloaded")
        || lower.contains("unavailable")
        || lower.contains("server_error")
        || lower.contains("internal error")
    {
        return Some(FailureKind::Transient);
    }

    None
}
