//! Request dispatcher
//!
//! Walks the registry's candidate list in order under one shared time
//! budget. Each attempt is recorded and reported to the registry before the
//! next step is decided.

use crate::protocol::{CanonicalRequest, CanonicalResponse};
use crate::providers::adapter::InvokeContext;
use crate::registry::{AttemptOutcome, Candidate, ProviderRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What to do after a permanent error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermanentErrorPolicy {
    /// End the dispatch; the request itself is at fault
    #[default]
    Abort,
    /// Treat it like a transient error and try the next candidate
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Budget for requests that do not carry their own timeout
    pub default_timeout: Duration,

    pub on_permanent_error: PermanentErrorPolicy,

    /// How long a cancelled attempt may take to unwind
    pub cancel_grace: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            on_permanent_error: PermanentErrorPolicy::Abort,
            cancel_grace: Duration::from_millis(250),
        }
    }
}

/// Record of one attempt against one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub provider_id: String,
    pub outcome: AttemptOutcome,
    #[serde(rename = "elapsed_ms", with = "crate::protocol::types::duration_ms")]
    pub elapsed: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Terminal dispatch failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("No provider available for model hint {model_hint:?}")]
    NoProviderAvailable { model_hint: Option<String> },

    #[error("All providers failed after {} attempts", .attempts.len())]
    AllProvidersFailed {
        attempts: Vec<DispatchAttempt>,
        /// The time budget ran out before the candidates did
        budget_exhausted: bool,
    },

    #[error("Permanent error from provider '{provider_id}': {message}")]
    PermanentFailure {
        provider_id: String,
        message: String,
        attempts: Vec<DispatchAttempt>,
    },
}

impl DispatchError {
    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoProviderAvailable { .. } => "no_provider_available",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::PermanentFailure { .. } => "permanent_error",
        }
    }

    pub fn attempts(&self) -> &[DispatchAttempt] {
        match self {
            Self::NoProviderAvailable { .. } => &[],
            Self::AllProvidersFailed { attempts, .. } | Self::PermanentFailure { attempts, .. } => {
                attempts
            }
        }
    }

    /// Whether the dispatch ended because time ran out
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::AllProvidersFailed {
                attempts,
                budget_exhausted,
            } => {
                *budget_exhausted
                    || attempts
                        .last()
                        .is_some_and(|a| a.outcome == AttemptOutcome::Timeout)
            }
            _ => false,
        }
    }
}

/// Routes canonical requests across the registered providers
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    config: DispatchConfig,
}

enum Step {
    Done(CanonicalResponse),
    Next,
    Abort(DispatchError),
    OutOfTime,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Serve one request, falling back across candidates
    pub async fn dispatch(
        &self,
        request: &CanonicalRequest,
    ) -> Result<CanonicalResponse, DispatchError> {
        let budget = request.timeout.unwrap_or(self.config.default_timeout);
        let started = Instant::now();
        let deadline = started + budget;
        let request_id = Uuid::new_v4();

        let candidates = self.registry.list_candidates(request.model_hint.as_deref());
        if candidates.is_empty() {
            warn!(%request_id, model_hint = ?request.model_hint, "No provider available");
            return Err(DispatchError::NoProviderAvailable {
                model_hint: request.model_hint.clone(),
            });
        }

        info!(
            %request_id,
            model_hint = ?request.model_hint,
            candidates = candidates.len(),
            budget_ms = budget.as_millis() as u64,
            "Dispatching request"
        );

        let mut attempts = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let now = Instant::now();
            if now >= deadline {
                warn!(%request_id, "Time budget spent before next attempt");
                return Err(DispatchError::AllProvidersFailed {
                    attempts,
                    budget_exhausted: true,
                });
            }

            let step = self
                .attempt(request, candidate, request_id, started, deadline, &mut attempts)
                .await;

            match step {
                Step::Done(response) => return Ok(response),
                Step::Next => continue,
                Step::Abort(err) => return Err(err),
                Step::OutOfTime => {
                    return Err(DispatchError::AllProvidersFailed {
                        attempts,
                        budget_exhausted: true,
                    })
                }
            }
        }

        warn!(%request_id, attempts = attempts.len(), "All providers failed");
        Err(DispatchError::AllProvidersFailed {
            attempts,
            budget_exhausted: false,
        })
    }

    async fn attempt(
        &self,
        request: &CanonicalRequest,
        candidate: &Candidate,
        request_id: Uuid,
        started: Instant,
        deadline: Instant,
        attempts: &mut Vec<DispatchAttempt>,
    ) -> Step {
        let provider_id = candidate.id().to_string();
        let attempt_started = Instant::now();
        let cancel = CancellationToken::new();
        let context = InvokeContext {
            model: candidate.model.clone(),
            request_id,
            timeout: deadline.saturating_duration_since(attempt_started),
            cancel: cancel.clone(),
        };

        debug!(
            %request_id,
            provider = %provider_id,
            model = %candidate.model,
            health = %candidate.health,
            remaining_ms = context.timeout.as_millis() as u64,
            "Attempting provider"
        );

        let invoke = candidate.provider.invoke(request, &context);
        tokio::pin!(invoke);

        let result = tokio::select! {
            result = &mut invoke => Some(result),
            _ = tokio::time::sleep_until(deadline) => None,
        };

        let Some(result) = result else {
            cancel.cancel();
            // Let the adapter observe cancellation and drop its connection
            if tokio::time::timeout(self.config.cancel_grace, &mut invoke)
                .await
                .is_err()
            {
                debug!(
                    %request_id,
                    provider = %provider_id,
                    "Adapter did not unwind within grace period"
                );
            }

            let elapsed = attempt_started.elapsed();
            warn!(
                %request_id,
                provider = %provider_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Time budget exhausted mid-attempt"
            );
            self.record(
                attempts,
                &provider_id,
                AttemptOutcome::Timeout,
                elapsed,
                Some("Time budget exhausted".to_string()),
            );
            return Step::OutOfTime;
        };

        let elapsed = attempt_started.elapsed();
        match result {
            Ok(completion) => {
                self.record(attempts, &provider_id, AttemptOutcome::Success, elapsed, None);
                let latency = started.elapsed();
                info!(
                    %request_id,
                    provider = %provider_id,
                    model = %completion.model,
                    elapsed_ms = latency.as_millis() as u64,
                    attempts = attempts.len(),
                    "Request served"
                );
                Step::Done(CanonicalResponse::from_completion(
                    completion,
                    &provider_id,
                    latency,
                ))
            }
            Err(err) => {
                let outcome = AttemptOutcome::from(err.kind);
                warn!(
                    %request_id,
                    provider = %provider_id,
                    outcome = ?outcome,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "Provider attempt failed"
                );
                self.record(attempts, &provider_id, outcome, elapsed, Some(err.message.clone()));

                if outcome == AttemptOutcome::PermanentError
                    && self.config.on_permanent_error == PermanentErrorPolicy::Abort
                {
                    return Step::Abort(DispatchError::PermanentFailure {
                        provider_id,
                        message: err.message,
                        attempts: std::mem::take(attempts),
                    });
                }
                Step::Next
            }
        }
    }

    fn record(
        &self,
        attempts: &mut Vec<DispatchAttempt>,
        provider_id: &str,
        outcome: AttemptOutcome,
        elapsed: Duration,
        message: Option<String>,
    ) {
        attempts.push(DispatchAttempt {
            provider_id: provider_id.to_string(),
            outcome,
            elapsed,
            message,
        });
        if let Err(err) = self.registry.report_outcome(provider_id, outcome) {
            warn!(provider = provider_id, error = %err, "Failed to report outcome");
        }
    }
}
