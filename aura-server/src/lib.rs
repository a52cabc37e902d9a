//! HTTP front end for the Aura gateway
//!
//! Serves:
//! - `POST /v1/generate`  : dispatch one canonical request
//! - `GET  /v1/providers` : registry snapshot with current health
//! - `GET  /health`       : liveness check

use aura_core::protocol::{CanonicalRequest, CanonicalResponse};
use aura_core::registry::ProviderDescriptor;
use aura_core::routing::{DispatchAttempt, DispatchError, Dispatcher};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Build the axum router for the gateway
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate", post(generate))
        .route("/v1/providers", get(list_providers))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error payload shared by every non-200 reply of `/v1/generate`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_kind: String,
    pub message: String,
    pub attempts: Vec<DispatchAttempt>,
}

/// An error reply with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error_kind: "invalid_request".to_string(),
                message: message.into(),
                attempts: Vec::new(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let status = if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            body: ErrorBody {
                error_kind: err.kind().to_string(),
                message: err.to_string(),
                attempts: err.attempts().to_vec(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn check_request(request: &CanonicalRequest) -> Result<(), ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::invalid_request("prompt must not be empty"));
    }
    if request.timeout == Some(Duration::ZERO) {
        return Err(ApiError::invalid_request("timeout_ms must be greater than 0"));
    }
    if request.tools.iter().any(|tool| tool.name.trim().is_empty()) {
        return Err(ApiError::invalid_request("tool name must not be empty"));
    }
    Ok(())
}

/// POST /v1/generate
async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<CanonicalRequest>, JsonRejection>,
) -> Result<Json<CanonicalResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected request body");
        ApiError::invalid_request(rejection.body_text())
    })?;
    check_request(&request)?;

    let response = state.dispatcher.dispatch(&request).await?;
    Ok(Json(response))
}

/// GET /v1/providers
async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderDescriptor>> {
    Json(state.dispatcher.registry().snapshot())
}

/// GET /health
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
