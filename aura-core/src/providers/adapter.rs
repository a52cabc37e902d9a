//! Provider adapter trait and capabilities
//!
//! Defines the core abstraction for LLM backends. One implementation exists
//! per backend family; which one serves a configured provider is decided once
//! at startup from its [`ProviderKind`].

use crate::config::{ProviderConfig, SecretString};
use crate::http::HttpClient;
use crate::protocol::{CanonicalRequest, Completion};
use crate::providers::error::AdapterResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Model set entry that accepts any bare model hint
pub const ANY_MODEL: &str = "*";

/// Core adapter trait that all LLM backends must implement
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static capability metadata for the registry
    fn describe(&self) -> &ProviderCapabilities;

    /// The provider's unique id
    fn id(&self) -> &str {
        &self.describe().id
    }

    /// Run one request against the backend.
    ///
    /// Every failure must already be mapped into an [`AdapterError`] kind.
    /// Implementations must stop promptly once `context.cancel` fires.
    ///
    /// [`AdapterError`]: crate::providers::error::AdapterError
    async fn invoke(
        &self,
        request: &CanonicalRequest,
        context: &InvokeContext,
    ) -> AdapterResult<Completion>;
}

/// Per-attempt context handed to an adapter by the dispatcher
#[derive(Debug, Clone)]
pub struct InvokeContext {
    /// Backend model resolved from the hint or the provider default
    pub model: String,

    /// Correlation ID shared by every attempt of one dispatch
    pub request_id: Uuid,

    /// Remaining time budget for this attempt
    pub timeout: Duration,

    /// Fired by the dispatcher when the budget runs out
    pub cancel: CancellationToken,
}

impl InvokeContext {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            request_id: Uuid::new_v4(),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn request_options(&self) -> crate::http::RequestOptions {
        crate::http::RequestOptions::new(self.timeout).with_request_id(self.request_id)
    }
}

/// Backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    DeepSeek,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// Base URL used when the configuration leaves it out
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Create the adapter for this backend family
    pub fn create_provider(&self, config: &ProviderConfig, http: HttpClient) -> Arc<dyn Provider> {
        let capabilities = ProviderCapabilities::from_config(config);
        let endpoint = Endpoint::new(
            config
                .base_url
                .clone()
                .unwrap_or_else(|| self.default_base_url().to_string()),
            config.api_key.clone(),
            http,
        );

        match self {
            ProviderKind::OpenAI | ProviderKind::DeepSeek => Arc::new(
                crate::providers::OpenAIProvider::new(capabilities, endpoint),
            ),
            ProviderKind::Anthropic => Arc::new(crate::providers::AnthropicProvider::new(
                capabilities,
                endpoint,
            )),
            ProviderKind::Gemini => Arc::new(crate::providers::GeminiProvider::new(
                capabilities,
                endpoint,
            )),
        }
    }
}

/// Coarse cost or latency class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    #[default]
    Medium,
    High,
}

/// Static capability metadata reported by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Unique provider id
    pub id: String,

    /// Backend family
    pub kind: ProviderKind,

    /// Model names this provider serves
    pub models: BTreeSet<String>,

    /// Model used when the hint does not name one
    pub default_model: String,

    /// Maximum context window size, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<u32>,

    #[serde(default)]
    pub cost_class: Tier,

    #[serde(default)]
    pub latency_class: Tier,
}

impl ProviderCapabilities {
    pub fn new(
        id: impl Into<String>,
        kind: ProviderKind,
        models: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let models: BTreeSet<String> = models.into_iter().map(Into::into).collect();
        let default_model = models
            .iter()
            .find(|m| m.as_str() != ANY_MODEL)
            .cloned()
            .unwrap_or_default();
        Self {
            id: id.into(),
            kind,
            models,
            default_model,
            max_context_tokens: None,
            cost_class: Tier::default(),
            latency_class: Tier::default(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut capabilities = Self::new(config.id.clone(), config.kind, config.models.clone());
        if let Some(default_model) = &config.default_model {
            capabilities.default_model = default_model.clone();
        }
        capabilities.max_context_tokens = config.max_context_tokens;
        capabilities.cost_class = config.cost_class;
        capabilities.latency_class = config.latency_class;
        capabilities
    }

    /// Whether a bare model name is served by this provider
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.contains(model) || self.models.contains(ANY_MODEL)
    }
}

/// Where and how an adapter reaches its backend
#[derive(Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub api_key: SecretString,
    pub http: HttpClient,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
