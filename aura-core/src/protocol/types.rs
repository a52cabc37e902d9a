//! Canonical request/response types shared by every adapter and caller
//!
//! Adapters translate from [`CanonicalRequest`] into their backend's wire
//! format and hand back a [`Completion`]; the dispatcher then normalizes the
//! completion into a [`CanonicalResponse`] stamped with the serving provider
//! and the measured latency.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Role of a prior conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
}

/// A prior turn in the conversation, sent before the prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A scalar request parameter (temperature, max_tokens, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view; integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Non-negative integer view; integral floats are accepted
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) if *i >= 0 => Some(*i as u64),
            Self::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Parameter keys every adapter understands
pub mod params {
    pub const TEMPERATURE: &str = "temperature";
    pub const MAX_TOKENS: &str = "max_tokens";
    pub const TOP_P: &str = "top_p";
    pub const STOP: &str = "stop";

    /// Keys with a dedicated mapping in every backend
    pub const KNOWN: [&str; 4] = [TEMPERATURE, MAX_TOKENS, TOP_P, STOP];
}

/// A function the model may call instead of answering in text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema of the arguments object
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The first function call a backend asked for, normalized across vendors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: Value,
}

/// Generic "generate" request accepted by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalRequest {
    /// The user prompt; sent as the final user turn
    pub prompt: String,

    /// Model name, provider id, or `provider/model` pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,

    /// Sampling and length parameters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Scalar>,

    /// Total time budget shared across all provider attempts.
    /// `None` means the dispatcher's configured default.
    #[serde(
        rename = "timeout_ms",
        default,
        with = "duration_ms_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,

    /// System instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Prior conversation turns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,

    /// Ask the backend for a JSON object
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub json: bool,

    /// Functions offered to the model; the backend decides whether to call one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl CanonicalRequest {
    /// Create a request for a prompt with no hint and default budget
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn temperature(&self) -> Option<f64> {
        self.parameters.get(params::TEMPERATURE).and_then(Scalar::as_f64)
    }

    pub fn max_tokens(&self) -> Option<u64> {
        self.parameters.get(params::MAX_TOKENS).and_then(Scalar::as_u64)
    }

    pub fn top_p(&self) -> Option<f64> {
        self.parameters.get(params::TOP_P).and_then(Scalar::as_f64)
    }

    /// Stop sequences; a single string parameter becomes one sequence
    pub fn stop(&self) -> Option<Vec<String>> {
        self.parameters
            .get(params::STOP)
            .and_then(Scalar::as_str)
            .map(|s| vec![s.to_string()])
    }

    /// Parameters without a dedicated mapping
    pub fn extra_parameters(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.parameters
            .iter()
            .filter(|(key, _)| !params::KNOWN.contains(&key.as_str()))
    }

    /// The full conversation: explicit system, prior turns, then the prompt
    pub fn conversation(&self) -> Vec<Message> {
        let mut turns = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = &self.system {
            turns.push(Message::system(system.clone()));
        }
        turns.extend(self.messages.iter().cloned());
        turns.push(Message::user(self.prompt.clone()));
        turns
    }
}

/// Token accounting reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// What an adapter hands back before normalization
///
/// `text` may be empty only when `tool_call` is set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
    pub tool_call: Option<ToolCall>,
}

/// The single response shape returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResponse {
    pub text: String,
    pub provider_id: String,
    pub model: String,
    #[serde(rename = "latency_ms", with = "duration_ms")]
    pub latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

impl CanonicalResponse {
    /// Normalize an adapter completion into the caller-facing response
    pub fn from_completion(completion: Completion, provider_id: &str, latency: Duration) -> Self {
        Self {
            text: completion.text,
            provider_id: provider_id.to_string(),
            model: completion.model,
            latency,
            usage: completion.usage,
            finish_reason: completion.finish_reason,
            tool_call: completion.tool_call,
        }
    }
}

/// Durations on the wire are integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

pub(crate) mod duration_ms_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
