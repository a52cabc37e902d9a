//! Conversion between the canonical protocol and OpenAI format

use super::types::*;
use crate::protocol::{CanonicalRequest, Completion, MessageRole, Scalar, ToolCall, Usage};
use crate::providers::error::{AdapterError, AdapterResult};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Body fields the adapter owns; caller parameters may not overwrite them
const RESERVED_KEYS: [&str; 7] = [
    "model",
    "messages",
    "stream",
    "response_format",
    "tools",
    "tool_choice",
    "n",
];

/// Convert a canonical request to OpenAI format
pub fn to_openai_request(request: &CanonicalRequest, model: &str) -> OpenAIRequest {
    let tools: Vec<OpenAITool> = request
        .tools
        .iter()
        .map(|tool| OpenAITool {
            tool_type: "function".to_string(),
            function: OpenAIFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect();

    OpenAIRequest {
        model: model.to_string(),
        messages: request
            .conversation()
            .into_iter()
            .map(|message| OpenAIMessage {
                role: role_name(message.role).to_string(),
                content: Some(message.content),
                tool_calls: Vec::new(),
            })
            .collect(),
        temperature: request.temperature(),
        max_tokens: request.max_tokens(),
        top_p: request.top_p(),
        stop: request.stop(),
        response_format: request.json.then(|| OpenAIResponseFormat {
            format_type: "json_object".to_string(),
        }),
        tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
        tools,
        extra: extra_fields(request),
    }
}

fn extra_fields(request: &CanonicalRequest) -> BTreeMap<String, Value> {
    request
        .extra_parameters()
        .filter(|(key, _)| {
            let reserved = RESERVED_KEYS.contains(&key.as_str());
            if reserved {
                debug!(parameter = %key, "Dropping parameter that names a reserved field");
            }
            !reserved
        })
        .map(|(key, value)| (key.clone(), scalar_to_value(value)))
        .collect()
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn scalar_to_value(scalar: &Scalar) -> Value {
    serde_json::to_value(scalar).unwrap_or(Value::Null)
}

/// Convert an OpenAI response into a completion
///
/// A reply with neither text nor a tool call is treated as a transient
/// backend hiccup.
pub fn from_openai_response(response: OpenAIResponse, model: &str) -> AdapterResult<Completion> {
    let usage = response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u
            .total_tokens
            .unwrap_or(u.prompt_tokens.saturating_add(u.completion_tokens)),
    });

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::transient("Response contained no choices"))?;

    let tool_call = choice
        .message
        .tool_calls
        .into_iter()
        .next()
        .map(parse_tool_call)
        .transpose()?;

    let text = choice.message.content.unwrap_or_default();
    if text.is_empty() && tool_call.is_none() {
        return Err(AdapterError::transient("Response contained no text"));
    }

    Ok(Completion {
        text,
        model: response.model.unwrap_or_else(|| model.to_string()),
        usage,
        finish_reason: choice.finish_reason,
        tool_call,
    })
}

fn parse_tool_call(call: OpenAIToolCall) -> AdapterResult<ToolCall> {
    let arguments = if call.function.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.function.arguments).map_err(|e| {
            AdapterError::transient(format!("Tool call arguments are not valid JSON: {}", e))
        })?
    };
    Ok(ToolCall {
        tool_name: call.function.name,
        arguments,
    })
}
