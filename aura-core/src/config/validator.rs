//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::AuraConfig;
use tracing::debug;

/// Cross-section rules on top of the per-section checks
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &AuraConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_enabled(config)?;
        self.validate_timing(config)?;
        self.log_priority_ties(config);

        Ok(())
    }

    fn validate_enabled(&self, config: &AuraConfig) -> Result<(), ValidationError> {
        if config.enabled_providers().next().is_none() {
            return Err(ValidationError::incompatible(
                "providers",
                "At least one provider must be enabled",
            ));
        }
        Ok(())
    }

    /// The grace period comes out of the same budget a request is given
    fn validate_timing(&self, config: &AuraConfig) -> Result<(), ValidationError> {
        let routing = &config.routing;
        if routing.cancel_grace_ms >= routing.default_timeout_ms {
            return Err(ValidationError::incompatible(
                "routing.cancel_grace_ms",
                "Must be shorter than routing.default_timeout_ms",
            ));
        }
        Ok(())
    }

    fn log_priority_ties(&self, config: &AuraConfig) {
        let enabled: Vec<_> = config.enabled_providers().collect();
        for (i, a) in enabled.iter().enumerate() {
            for b in &enabled[i + 1..] {
                if a.priority == b.priority {
                    debug!(
                        first = %a.id,
                        second = %b.id,
                        priority = a.priority,
                        "Providers share a priority; registration order breaks the tie"
                    );
                }
            }
        }
    }
}
