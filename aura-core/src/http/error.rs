//! HTTP error mapping utilities

use crate::providers::error::{classify_message, AdapterError, FailureKind};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Map a non-success HTTP response to an [`AdapterError`]
pub fn map_http_error(
    status: StatusCode,
    headers: Option<&HeaderMap>,
    body: Option<String>,
    request_id: Uuid,
) -> AdapterError {
    // Try to parse error details from response body
    let error_details = body
        .as_ref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_details(&v));

    let error_message = error_details
        .as_ref()
        .map(|d| d.message.clone())
        .or_else(|| body.clone().filter(|b| !b.is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    let retry_after = headers
        .and_then(|h| h.get(RETRY_AFTER))
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
        .or_else(|| {
            error_details
                .as_ref()
                .and_then(|d| d.retry_after_seconds)
                .map(Duration::from_secs)
        });

    let message_with_id = format!("{} [request_id: {}]", error_message, request_id);
    let mapped = classify_status(status.as_u16(), message_with_id, retry_after);

    // A 4xx whose body says "quota" or "rate limit" is back-pressure, not a bad request
    if mapped.kind == FailureKind::Permanent {
        let hint = match &error_details {
            Some(d) => format!("{} {}", d.error_type.as_deref().unwrap_or(""), d.message),
            None => error_message,
        };
        if let Some(kind) = classify_message(&hint) {
            if kind == FailureKind::RateLimited {
                return AdapterError { kind, ..mapped };
            }
        }
    }

    mapped
}

/// Map an HTTP status code to a failure kind
pub(crate) fn classify_status(
    status: u16,
    message: String,
    retry_after: Option<Duration>,
) -> AdapterError {
    match status {
        429 => AdapterError::rate_limited(message, retry_after),
        408 | 504 => AdapterError::timeout(message),
        // 529 is Anthropic's "overloaded"
        500..=599 => AdapterError::transient(message),
        400..=499 => AdapterError::permanent(message),
        _ => AdapterError::transient(message),
    }
}

/// Error details extracted from response body
struct ErrorDetails {
    message: String,
    error_type: Option<String>,
    retry_after_seconds: Option<u64>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // OpenAI:    { "error": { "message": "...", "type": "...", "code": "..." } }
    // Anthropic: { "type": "error", "error": { "type": "...", "message": "..." } }
    // Gemini:    { "error": { "code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED" } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            let error_type = ["type", "status", "code"]
                .iter()
                .find_map(|key| error.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string);
            return Some(ErrorDetails {
                message: message.to_string(),
                error_type,
                retry_after_seconds: error.get("retry_after").and_then(|v| v.as_u64()),
            });
        }
        if let Some(message) = error.as_str() {
            return Some(ErrorDetails {
                message: message.to_string(),
                error_type: None,
                retry_after_seconds: None,
            });
        }
    }

    // Generic format: { "message": "..." }
    json.get("message")
        .and_then(|v| v.as_str())
        .map(|message| ErrorDetails {
            message: message.to_string(),
            error_type: None,
            retry_after_seconds: json.get("retry_after").and_then(|v| v.as_u64()),
        })
}

/// Parse Retry-After header value
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    // Only the delta-seconds form; HTTP dates are ignored
    header_value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
