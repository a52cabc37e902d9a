//! Protocol module for the canonical request/response shape
//!
//! These structures are what callers send and receive regardless of which
//! backend ends up serving the request.

pub mod types;

pub use types::{
    params, CanonicalRequest, CanonicalResponse, Completion, Message, MessageRole, Scalar,
    ToolCall, ToolDefinition, Usage,
};
