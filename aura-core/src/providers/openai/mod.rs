//! OpenAI provider implementation
//!
//! This module provides an adapter for the OpenAI chat completions API,
//! translating between the canonical protocol and OpenAI's wire format.
//! DeepSeek exposes the same API and is served by the same adapter.

mod client;
pub mod converter;
pub mod types;

pub use client::OpenAIProvider;
pub use types::{OpenAIRequest, OpenAIResponse};
