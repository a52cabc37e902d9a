//! Startup wiring from configuration to a ready dispatcher

use crate::config::AuraConfig;
use crate::http::HttpClient;
use crate::registry::{ProviderRegistry, RegistryError};
use crate::routing::Dispatcher;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Create one adapter per enabled provider and register it
///
/// All adapters share `http`, and with it one connection pool.
pub fn build_registry(
    config: &AuraConfig,
    http: &HttpClient,
) -> Result<ProviderRegistry, RegistryError> {
    let mut registry = ProviderRegistry::new(config.health.policy());

    for provider in config.enabled_providers() {
        debug!(
            provider = %provider.id,
            kind = ?provider.kind,
            api_key = %provider.api_key.partial_redact(),
            "Creating adapter"
        );
        let adapter = provider.kind.create_provider(provider, http.clone());
        registry.register(adapter, provider.priority)?;
    }

    Ok(registry)
}

/// Build the dispatcher described by `config`
pub fn build_dispatcher(config: &AuraConfig) -> Result<Dispatcher, BuildError> {
    let http = HttpClient::with_config(&config.connection)?;
    let registry = build_registry(config, &http)?;
    info!(providers = registry.len(), "Provider registry ready");

    Ok(Dispatcher::new(
        Arc::new(registry),
        config.routing.dispatch_config(),
    ))
}
