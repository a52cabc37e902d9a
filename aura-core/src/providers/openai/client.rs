//! OpenAI-compatible client implementation

use super::converter::{from_openai_response, to_openai_request};
use super::types::OpenAIResponse;
use crate::protocol::{CanonicalRequest, Completion};
use crate::providers::adapter::{Endpoint, InvokeContext, Provider, ProviderCapabilities};
use crate::providers::error::AdapterResult;
use async_trait::async_trait;
use tracing::debug;

/// Adapter for OpenAI and OpenAI-compatible backends such as DeepSeek
pub struct OpenAIProvider {
    capabilities: ProviderCapabilities,
    endpoint: Endpoint,
}

impl OpenAIProvider {
    pub fn new(capabilities: ProviderCapabilities, endpoint: Endpoint) -> Self {
        Self {
            capabilities,
            endpoint,
        }
    }

    fn build_headers(&self) -> Vec<(&'static str, String)> {
        vec![(
            "Authorization",
            format!("Bearer {}", self.endpoint.api_key.expose_secret()),
        )]
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn describe(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn invoke(
        &self,
        request: &CanonicalRequest,
        context: &InvokeContext,
    ) -> AdapterResult<Completion> {
        let body = to_openai_request(request, &context.model);
        let url = self.endpoint.url("/chat/completions");
        debug!(
            provider = %self.capabilities.id,
            model = %context.model,
            "Invoking chat completion"
        );

        let response: OpenAIResponse = self
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

        from_openai_response(response, &context.model)
    }
}
