//! Provider adapters
//!
//! Each backend family gets one adapter that maps the canonical request into
//! its wire format, calls the backend through the shared HTTP client and maps
//! every failure into a [`FailureKind`].

pub mod adapter;
pub mod anthropic;
pub mod error;
pub mod gemini;
pub mod openai;

pub use adapter::{
    Endpoint, InvokeContext, Provider, ProviderCapabilities, ProviderKind, Tier, ANY_MODEL,
};
pub use error::{AdapterError, AdapterResult, FailureKind};

// Re-export concrete providers
pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
