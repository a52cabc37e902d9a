//! Google Gemini provider implementation
//!
//! Talks to the `generateContent` endpoint. Gemini names the assistant role
//! `model`, takes system text as `systemInstruction` and nests sampling
//! parameters under `generationConfig`.

use crate::protocol::{CanonicalRequest, Completion, MessageRole, ToolCall, Usage};
use crate::providers::adapter::{Endpoint, InvokeContext, Provider, ProviderCapabilities};
use crate::providers::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,

    pub generation_config: GenerationConfig,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GeminiTool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,

    #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>,

    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,

    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    #[serde(default)]
    pub prompt_token_count: u32,

    #[serde(default)]
    pub candidates_token_count: u32,

    #[serde(default)]
    pub total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

fn text_content(role: Option<&str>, text: String) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart {
            text: Some(text),
            function_call: None,
        }],
    }
}

/// Gemini schemas spell types in upper case (`OBJECT`, `STRING`, ...)
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", Value::String(t)) => Value::String(t.to_uppercase()),
                        _ => to_gemini_schema(value),
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

/// Build the `generateContent` URL with the model as one encoded path segment
pub fn generate_content_url(base_url: &str, model: &str) -> AdapterResult<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AdapterError::permanent(format!("Invalid base URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| AdapterError::permanent(format!("Base URL {} cannot take a path", base_url)))?
        .pop_if_empty()
        .push("models")
        .push(&format!("{}:generateContent", model));
    Ok(url.into())
}

/// Convert a canonical request to Gemini format
///
/// The first system turn becomes `systemInstruction`; later ones are sent
/// as user turns. Empty turns are skipped. JSON mode is only requested when
/// no tools are offered.
pub fn to_gemini_request(request: &CanonicalRequest) -> GeminiRequest {
    let mut system_instruction = None;
    let mut contents = Vec::new();

    for message in request.conversation() {
        if message.content.is_empty() {
            continue;
        }
        match message.role {
            MessageRole::System if system_instruction.is_none() => {
                system_instruction = Some(text_content(None, message.content));
            }
            MessageRole::System | MessageRole::User => {
                contents.push(text_content(Some("user"), message.content))
            }
            MessageRole::Assistant => contents.push(text_content(Some("model"), message.content)),
        }
    }

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            temperature: request.temperature(),
            max_output_tokens: request.max_tokens(),
            top_p: request.top_p(),
            stop_sequences: request.stop(),
            response_mime_type: (request.json && request.tools.is_empty())
                .then(|| "application/json".to_string()),
        },
        tools: if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|tool| FunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: to_gemini_schema(&tool.parameters),
                    })
                    .collect(),
            }]
        },
    }
}

/// Convert a Gemini response into a completion
///
/// A prompt blocked by the backend's safety filter will be blocked again on
/// retry, so it is reported as permanent.
pub fn from_gemini_response(response: GeminiResponse, model: &str) -> AdapterResult<Completion> {
    if response.candidates.is_empty() {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AdapterError::permanent(format!("Prompt blocked: {}", reason)));
        }
    }

    let usage = response.usage_metadata.map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u
            .total_token_count
            .unwrap_or(u.prompt_token_count.saturating_add(u.candidates_token_count)),
    });

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::transient("Response contained no candidates"))?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let tool_call = parts
        .iter()
        .find_map(|part| part.function_call.as_ref())
        .map(|call| ToolCall {
            tool_name: call.name.clone(),
            arguments: match &call.args {
                Value::Null => Value::Object(Default::default()),
                args => args.clone(),
            },
        });
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();

    if text.is_empty() && tool_call.is_none() {
        return Err(AdapterError::transient("Response contained no text"));
    }

    Ok(Completion {
        text,
        model: response.model_version.unwrap_or_else(|| model.to_string()),
        usage,
        finish_reason: candidate.finish_reason,
        tool_call,
    })
}

/// Gemini provider implementation
pub struct GeminiProvider {
    capabilities: ProviderCapabilities,
    endpoint: Endpoint,
}

impl GeminiProvider {
    pub fn new(capabilities: ProviderCapabilities, endpoint: Endpoint) -> Self {
        Self {
            capabilities,
            endpoint,
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn describe(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn invoke(
        &self,
        request: &CanonicalRequest,
        context: &InvokeContext,
    ) -> AdapterResult<Completion> {
        let body = to_gemini_request(request);
        for (key, _) in request.extra_parameters() {
            debug!(
                provider = %self.capabilities.id,
                parameter = %key,
                "Dropping unsupported parameter"
            );
        }
        let url = generate_content_url(&self.endpoint.base_url, &context.model)?;
        debug!(
            provider = %self.capabilities.id,
            model = %context.model,
            "Invoking generateContent"
        );

        let headers = [(
            "x-goog-api-key",
            self.endpoint.api_key.expose_secret().to_string(),
        )];
        let response: GeminiResponse = self
            .endpoint
            .http
            .post_json(
                &self.capabilities.id,
                &url,
                &headers,
                &body,
                &context.request_options(),
                &context.cancel,
            )
            .await?;

        from_gemini_response(response, &context.model)
    }
}
