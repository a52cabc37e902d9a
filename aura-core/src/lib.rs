//! Aura Core Library
//!
//! Multi-provider LLM routing: a canonical request is sent to the best
//! available backend, falling back across providers when one fails, while a
//! per-provider health record steers later requests away from trouble.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use aura_core::{config, gateway, protocol::CanonicalRequest};
//!
//! let config = config::load_from_path("aura.yaml")?;
//! let dispatcher = gateway::build_dispatcher(&config)?;
//! let response = dispatcher
//!     .dispatch(&CanonicalRequest::new("Hello").with_model_hint("gpt-4o-mini"))
//!     .await?;
//! println!("{} answered: {}", response.provider_id, response.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gateway;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod routing;

pub use protocol::{CanonicalRequest, CanonicalResponse};
pub use registry::{ProviderRegistry, RegistryError};
pub use routing::{DispatchError, Dispatcher};

/// Returns the version of the Aura Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
