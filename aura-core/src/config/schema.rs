//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::providers::adapter::{ProviderKind, Tier, ANY_MODEL};
use crate::registry::HealthPolicy;
use crate::routing::{DispatchConfig, PermanentErrorPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// The only schema version understood
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuraConfig {
    /// Schema version (required - no default)
    pub version: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub health: HealthConfig,

    /// Outbound HTTP connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Listen address
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One configured backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider id
    pub id: String,

    /// Backend family (openai, deepseek, anthropic, gemini)
    pub kind: ProviderKind,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Overrides the family's public endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// Served model names; `"*"` accepts any bare model hint
    pub models: Vec<String>,

    #[serde(default)]
    pub default_model: Option<String>,

    /// Lower numbers are tried first
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub max_context_tokens: Option<u32>,

    #[serde(default)]
    pub cost_class: Tier,

    #[serde(default)]
    pub latency_class: Tier,
}

/// Dispatch settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Budget for requests without their own timeout
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default)]
    pub on_permanent_error: PermanentErrorPolicy,

    /// Grace period for a cancelled attempt to unwind
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            on_permanent_error: PermanentErrorPolicy::default(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

/// Health policy thresholds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_degrade_after")]
    pub degrade_after: u32,

    /// Unavailable window after a rate limit
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degrade_after: default_degrade_after(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            max_idle_per_host: default_max_idle(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_priority() -> i32 { 100 }
fn default_timeout_ms() -> u64 { 60_000 }
fn default_cancel_grace_ms() -> u64 { 250 }
fn default_degrade_after() -> u32 { 2 }
fn default_cooldown_ms() -> u64 { 30_000 }
fn default_connect_timeout() -> u64 { 10_000 }
fn default_max_idle() -> usize { 10 }
fn default_pool_idle_timeout() -> u64 { 90 }

impl RoutingConfig {
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            on_permanent_error: self.on_permanent_error,
            cancel_grace: Duration::from_millis(self.cancel_grace_ms),
        }
    }
}

impl HealthConfig {
    pub fn policy(&self) -> HealthPolicy {
        HealthPolicy::new(self.degrade_after, Duration::from_millis(self.cooldown_ms))
    }
}

impl AuraConfig {
    /// Providers that take part in routing
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be configured"));
        }

        let mut seen_ids = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_ids.insert(&provider.id) {
                return Err(ValidationError::duplicate(
                    format!("providers[{}].id", i),
                    provider.id.clone(),
                ));
            }

            provider.validate(&format!("providers[{}]", i))?;
        }

        self.routing.validate("routing")?;
        self.health.validate("health")?;
        self.connection.validate("connection")?;

        Ok(())
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.id", path)));
        }

        if self.id.contains('/') {
            return Err(ValidationError::incompatible(
                format!("{}.id", path),
                "Provider ids must not contain '/'",
            ));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if let Some(base_url) = &self.base_url {
            validate_base_url(&format!("{}.base_url", path), base_url)?;
        }

        if self.models.is_empty() {
            return Err(ValidationError::required(format!("{}.models", path))
                .with_context("List at least one model, or \"*\""));
        }

        let mut seen_models = HashSet::new();
        for (i, model) in self.models.iter().enumerate() {
            let model_path = format!("{}.models[{}]", path, i);
            if model.trim().is_empty() {
                return Err(ValidationError::required(model_path));
            }
            if !seen_models.insert(model) {
                return Err(ValidationError::duplicate(model_path, model.clone()));
            }
        }

        let wildcard = self.models.iter().any(|m| m == ANY_MODEL);
        match &self.default_model {
            Some(default_model) if !wildcard && !self.models.contains(default_model) => {
                return Err(ValidationError::incompatible(
                    format!("{}.default_model", path),
                    format!("'{}' is not in models", default_model),
                ));
            }
            None if self.models.iter().all(|m| m == ANY_MODEL) => {
                return Err(ValidationError::required(format!("{}.default_model", path))
                    .with_context("A wildcard-only model list needs a default model"));
            }
            _ => {}
        }

        if self.max_context_tokens == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.max_context_tokens", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn validate_base_url(path: &str, base_url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::new(
            path,
            ValidationErrorKind::InvalidUrl {
                message: format!("URL scheme must be http or https, got: {}", url.scheme()),
            },
        )),
        Err(e) => Err(ValidationError::new(
            path,
            ValidationErrorKind::InvalidUrl {
                message: e.to_string(),
            },
        )),
    }
}

impl RoutingConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.default_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.default_timeout_ms", path),
                "Must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl HealthConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.degrade_after == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.degrade_after", path),
                "Must be at least 1",
            ));
        }
        if self.cooldown_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.cooldown_ms", path),
                "Must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl ConnectionConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }
        Ok(())
    }
}
