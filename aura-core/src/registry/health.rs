//! Provider health policy
//!
//! A pure state transition `(state, outcome, now) -> state`. The registry is
//! the only caller and applies it under the provider's own lock.

use crate::providers::error::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Observed health of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

impl HealthStatus {
    /// Sort rank; healthier first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::Unavailable => 2,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Result of one attempt against one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientError,
    PermanentError,
    RateLimited,
    Timeout,
}

impl From<FailureKind> for AttemptOutcome {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Transient => Self::TransientError,
            FailureKind::Permanent => Self::PermanentError,
            FailureKind::RateLimited => Self::RateLimited,
            FailureKind::Timeout => Self::Timeout,
        }
    }
}

/// Mutable health record kept per provider
#[derive(Debug, Clone, PartialEq)]
pub struct HealthState {
    pub status: HealthStatus,

    /// Consecutive transient or timeout outcomes since the last success
    pub consecutive_failures: u32,

    /// End of the current cool-down window, while Unavailable
    pub unavailable_until: Option<Instant>,

    pub last_failure: Option<DateTime<Utc>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            unavailable_until: None,
            last_failure: None,
        }
    }
}

/// Thresholds for health transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive transient/timeout outcomes that demote Healthy to Degraded
    pub degrade_after: u32,

    /// How long a rate-limited provider stays Unavailable
    pub cooldown: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degrade_after: 2,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl HealthPolicy {
    pub fn new(degrade_after: u32, cooldown: Duration) -> Self {
        Self {
            degrade_after: degrade_after.max(1),
            cooldown,
        }
    }

    /// Apply one outcome
    pub fn apply(
        &self,
        state: &HealthState,
        outcome: AttemptOutcome,
        now: Instant,
        wall_clock: DateTime<Utc>,
    ) -> HealthState {
        let mut next = state.clone();

        match outcome {
            AttemptOutcome::Success => {
                next.status = HealthStatus::Healthy;
                next.consecutive_failures = 0;
                next.unavailable_until = None;
            }
            AttemptOutcome::TransientError | AttemptOutcome::Timeout => {
                next.consecutive_failures = state.consecutive_failures.saturating_add(1);
                next.last_failure = Some(wall_clock);
                if state.status == HealthStatus::Healthy
                    && next.consecutive_failures >= self.degrade_after
                {
                    next.status = HealthStatus::Degraded;
                }
            }
            AttemptOutcome::RateLimited => {
                next.status = HealthStatus::Unavailable;
                next.unavailable_until = Some(now + self.cooldown);
                next.last_failure = Some(wall_clock);
            }
            // The request is at fault, not the provider
            AttemptOutcome::PermanentError => {
                next.last_failure = Some(wall_clock);
            }
        }

        next
    }

    /// Expire an elapsed cool-down; the provider comes back on probation
    pub fn refresh(&self, state: &HealthState, now: Instant) -> HealthState {
        match (state.status, state.unavailable_until) {
            (HealthStatus::Unavailable, Some(until)) if until <= now => HealthState {
                status: HealthStatus::Degraded,
                unavailable_until: None,
                ..state.clone()
            },
            _ => state.clone(),
        }
    }
}
