//! Anthropic provider implementation
//!
//! Implements the Provider trait for Anthropic's Messages API. System text
//! travels as a top-level field and the API requires alternating roles, so
//! the conversation is reshaped before sending.

use crate::protocol::{CanonicalRequest, Completion, MessageRole, ToolCall, Usage};
use crate::providers::adapter::{Endpoint, InvokeContext, Provider, ProviderCapabilities};
use crate::providers::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// API version sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic requires max_tokens; used when the caller leaves it out
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u64,
    pub messages: Vec<AnthropicMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,

    #[serde(default)]
    pub stop_reason: Option<String>,

    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(default)]
    pub text: Option<String>,

    /// Tool name on `tool_use` blocks
    #[serde(default)]
    pub name: Option<String>,

    /// Tool arguments on `tool_use` blocks
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Anthropic provider implementation
pub struct AnthropicProvider {
    capabilities: ProviderCapabilities,
    endpoint: Endpoint,
}

impl AnthropicProvider {
    pub fn new(capabilities: ProviderCapabilities, endpoint: Endpoint) -> Self {
        Self {
            capabilities,
            endpoint,
        }
    }

    fn build_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", self.endpoint.api_key.expose_secret().to_string()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ]
    }
}

/// Convert a canonical request to Anthropic format
///
/// The first system turn becomes the top-level `system` field; any later
/// system turns are appended to it. Consecutive turns with the same role are
/// merged. The Messages API has no JSON mode, so `json` is ignored.
/// Tools are offered with `tool_choice` auto.
pub fn to_anthropic_request(request: &CanonicalRequest, model: &str) -> AnthropicRequest {
    let mut system: Option<String> = None;
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in request.conversation() {
        let role = match message.role {
            MessageRole::System => {
                match &mut system {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&message.content);
                    }
                    None => system = Some(message.content),
                }
                continue;
            }
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => messages.push(AnthropicMessage {
                role,
                content: message.content,
            }),
        }
    }

    AnthropicRequest {
        model: model.to_string(),
        max_tokens: request.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        system,
        temperature: request.temperature(),
        top_p: request.top_p(),
        stop_sequences: request.stop(),
        tools: request
            .tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters.clone(),
            })
            .collect(),
        tool_choice: (!request.tools.is_empty()).then(|| json!({"type": "auto"})),
    }
}

/// Convert an Anthropic response into a completion
///
/// Text blocks are joined; the first `tool_use` block becomes the tool call.
pub fn from_anthropic_response(
    response: AnthropicResponse,
    model: &str,
) -> AdapterResult<Completion> {
    let text: String = response
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    let tool_call = response
        .content
        .iter()
        .find(|block| block.block_type == "tool_use")
        .and_then(|block| {
            Some(ToolCall {
                tool_name: block.name.clone()?,
                arguments: block.input.clone().unwrap_or_else(|| json!({})),
            })
        });

    if text.is_empty() && tool_call.is_none() {
        return Err(AdapterError::transient("Response contained no text"));
    }

    Ok(Completion {
        text,
        model: response.model.unwrap_or_else(|| model.to_string()),
        usage: response
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens)),
        finish_reason: response.stop_reason,
        tool_call,
    })
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn describe(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn invoke(
        &self,
        request: &CanonicalRequest,
        context: &InvokeContext,
    ) -> AdapterResult<Completion> {
        let body = to_anthropic_request(request, &context.model);
        for (key, _) in request.extra_parameters() {
            debug!(
                provider = %self.capabilities.id,
                parameter = %key,
                "Dropping unsupported parameter"
            );
        }
        let url = self.endpoint.url("/messages");
        debug!(provider = %self.capabilities.id, model = %context.model, "Invoking messages API");

        let response: AnthropicResponse = self
            .endpoint
            .http
            .post_json(
                &self.capabilities.id,
                &url,
                &self.build_headers(),
                &body,
                &context.request_options(),
                &context.cancel,
            )
            .await?;

        from_anthropic_response(response, &context.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Message, ToolDefinition};
    use crate::providers::error::FailureKind;

    #[test]
    fn test_system_is_lifted_and_roles_merged() {
        let request = CanonicalRequest::new("And now?")
            .with_system("You are terse")
            .with_messages(vec![Message::user("First"), Message::system("Extra rule")]);

        let wire = to_anthropic_request(&request, "claude-3-5-sonnet");

        assert_eq!(wire.system.as_deref(), Some("You are terse\n\nExtra rule"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.messages[0].content, "First\n\nAnd now?");
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_caller_max_tokens_wins() {
        let request = CanonicalRequest::new("Hi")
            .with_parameter("max_tokens", 100i64)
            .with_parameter("seed", 3i64);
        let json = serde_json::to_value(to_anthropic_request(&request, "m")).unwrap();
        assert_eq!(json["max_tokens"], 100);
        assert!(json.get("system").is_none());
        assert!(json.get("seed").is_none());
    }

    #[test]
    fn test_response_text_blocks_are_joined() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "tool_use", "id": "x", "name": "n", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 3}
        }))
        .unwrap();

        let completion = from_anthropic_response(response, "claude").unwrap();
        assert_eq!(completion.text, "Hello, world");
        assert_eq!(completion.usage, Some(Usage::new(10, 3)));
        assert_eq!(completion.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(completion.tool_call.unwrap().tool_name, "n");
    }

    #[test]
    fn test_tools_are_offered_with_auto_choice() {
        let request = CanonicalRequest::new("Weather?").with_tools(vec![ToolDefinition::new(
            "get_weather",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        )]);

        let json = serde_json::to_value(to_anthropic_request(&request, "m")).unwrap();
        assert_eq!(json["tool_choice"], json!({"type": "auto"}));
        assert_eq!(json["tools"][0]["name"], "get_weather");
        assert_eq!(json["tools"][0]["input_schema"]["properties"]["city"]["type"], "string");
        assert!(json["tools"][0].get("description").is_none());
    }

    #[test]
    fn test_tool_use_without_text() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather",
                 "input": {"city": "Oslo"}},
                {"type": "tool_use", "id": "toolu_2", "name": "second", "input": {}}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let completion = from_anthropic_response(response, "claude").unwrap();
        assert_eq!(completion.text, "");
        assert_eq!(completion.finish_reason.as_deref(), Some("tool_use"));
        let call = completion.tool_call.unwrap();
        assert_eq!(call.tool_name, "get_weather");
        assert_eq!(call.arguments, json!({"city": "Oslo"}));
    }

    #[test]
    fn test_empty_content_is_transient() {
        let response: AnthropicResponse =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        let err = from_anthropic_response(response, "claude").unwrap_err();
        assert_eq!(err.kind, FailureKind::Transient);
    }
}
