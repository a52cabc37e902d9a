//! Provider registry
//!
//! Holds every configured adapter together with its priority and health.
//! Providers are registered during startup while the registry is exclusively
//! owned; afterwards it is shared behind an `Arc` and only health changes.
//! Each entry carries its own lock, so reports for different providers never
//! contend.

pub mod health;

use crate::providers::adapter::{Provider, ProviderKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

pub use health::{AttemptOutcome, HealthPolicy, HealthState, HealthStatus};

/// Errors raised by the registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),
}

struct ProviderEntry {
    adapter: Arc<dyn Provider>,
    priority: i32,
    state: Mutex<HealthState>,
}

/// A provider selected for a request, with the model to ask it for
#[derive(Clone)]
pub struct Candidate {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub priority: i32,
    pub health: HealthStatus,
}

impl Candidate {
    pub fn id(&self) -> &str {
        self.provider.id()
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("id", &self.id())
            .field("model", &self.model)
            .field("priority", &self.priority)
            .field("health", &self.health)
            .finish()
    }
}

/// Point-in-time view of one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub kind: ProviderKind,
    pub priority: i32,
    pub models: BTreeSet<String>,
    pub default_model: String,
    pub health: HealthStatus,
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
}

/// Registry of providers and their health
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
    index: HashMap<String, usize>,
    policy: HealthPolicy,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.index.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            policy,
        }
    }

    /// Add a provider; lower priority numbers are tried first
    pub fn register(
        &mut self,
        adapter: Arc<dyn Provider>,
        priority: i32,
    ) -> Result<(), RegistryError> {
        let id = adapter.id().to_string();
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicateProvider(id));
        }

        info!(provider = %id, priority, "Registered provider");
        self.index.insert(id, self.entries.len());
        self.entries.push(ProviderEntry {
            adapter,
            priority,
            state: Mutex::new(HealthState::default()),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Providers able to serve `model_hint`, best first
    ///
    /// Ordered by priority, then health, then registration order.
    /// Unavailable providers are left out unless they are the only matches.
    pub fn list_candidates(&self, model_hint: Option<&str>) -> Vec<Candidate> {
        let now = Instant::now();
        let pinned = model_hint.and_then(|hint| self.pinned_target(hint));

        let mut matches: Vec<(usize, Candidate)> = Vec::new();
        for (order, entry) in self.entries.iter().enumerate() {
            let capabilities = entry.adapter.describe();

            let model = match (&pinned, model_hint) {
                (Some((target, model)), _) => {
                    if *target != order {
                        continue;
                    }
                    model.clone()
                }
                (None, None) => capabilities.default_model.clone(),
                (None, Some(hint)) => {
                    if !capabilities.supports_model(hint) {
                        continue;
                    }
                    hint.to_string()
                }
            };

            let health = {
                let mut state = entry.state.lock();
                let refreshed = self.policy.refresh(&state, now);
                if refreshed.status != state.status {
                    info!(provider = %capabilities.id, "Cool-down elapsed, provider on probation");
                }
                *state = refreshed;
                state.status
            };

            matches.push((
                order,
                Candidate {
                    provider: Arc::clone(&entry.adapter),
                    model,
                    priority: entry.priority,
                    health,
                },
            ));
        }

        let any_available = matches
            .iter()
            .any(|(_, c)| c.health != HealthStatus::Unavailable);
        if any_available {
            matches.retain(|(_, c)| c.health != HealthStatus::Unavailable);
        }

        matches.sort_by_key(|(order, c)| (c.priority, c.health.rank(), *order));
        matches.into_iter().map(|(_, c)| c).collect()
    }

    /// `<provider_id>/<model>` or a bare provider id pins one provider
    fn pinned_target(&self, hint: &str) -> Option<(usize, String)> {
        if let Some((provider_id, model)) = hint.split_once('/') {
            if let Some(&index) = self.index.get(provider_id) {
                return Some((index, model.to_string()));
            }
        }

        self.index.get(hint).map(|&index| {
            let default_model = self.entries[index].adapter.describe().default_model.clone();
            (index, default_model)
        })
    }

    /// Feed one attempt outcome through the health policy
    pub fn report_outcome(
        &self,
        provider_id: &str,
        outcome: AttemptOutcome,
    ) -> Result<HealthStatus, RegistryError> {
        let index = *self
            .index
            .get(provider_id)
            .ok_or_else(|| RegistryError::UnknownProvider(provider_id.to_string()))?;

        let mut state = self.entries[index].state.lock();
        let next = self
            .policy
            .apply(&state, outcome, Instant::now(), Utc::now());

        if next.status != state.status {
            if next.status.rank() > state.status.rank() {
                warn!(
                    provider = provider_id,
                    from = %state.status,
                    to = %next.status,
                    consecutive_failures = next.consecutive_failures,
                    "Provider health demoted"
                );
            } else {
                info!(
                    provider = provider_id,
                    from = %state.status,
                    to = %next.status,
                    "Provider health restored"
                );
            }
        }

        *state = next;
        Ok(state.status)
    }

    /// Current health of one provider
    pub fn health(&self, provider_id: &str) -> Option<HealthStatus> {
        self.index
            .get(provider_id)
            .map(|&index| self.entries[index].state.lock().status)
    }

    /// Every provider in registration order
    pub fn snapshot(&self) -> Vec<ProviderDescriptor> {
        self.entries
            .iter()
            .map(|entry| {
                let capabilities = entry.adapter.describe();
                let state = entry.state.lock();
                ProviderDescriptor {
                    id: capabilities.id.clone(),
                    kind: capabilities.kind,
                    priority: entry.priority,
                    models: capabilities.models.clone(),
                    default_model: capabilities.default_model.clone(),
                    health: state.status,
                    consecutive_failures: state.consecutive_failures,
                    last_failure: state.last_failure,
                }
            })
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
