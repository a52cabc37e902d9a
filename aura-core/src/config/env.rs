//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Replace every `${VAR}` with the value of `VAR`
///
/// Runs on the raw file text before parsing. Fails on the first variable
/// that is not set.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;

    let mut missing = None;
    let result = pattern.replace_all(content, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}
