//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_TOKEN_SECRET: &str = "USER_SERVICE_TOKEN_SECRET";
pub const ENV_BIND_ADDRESS: &str = "USER_SERVICE_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Defaults plus environment overrides, validated.
///
/// Fails unless `USER_SERVICE_TOKEN_SECRET` supplies a signing key.
pub fn default_config() -> Result<ServiceConfig, ConfigError> {
    default_config_from(|key| std::env::var(key).ok())
}

/// [`default_config`] reading overrides from `env`.
pub fn default_config_from<F>(env: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    finish(ServiceConfig::default(), env)
}

/// Parse `content`, apply overrides from `env`, and validate.
pub fn parse_config<F>(content: &str, env: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config: ServiceConfig = toml::from_str(content)?;
    finish(config, env)
}

fn finish<F>(mut config: ServiceConfig, env: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Secrets and bind address may come from the environment instead of the file.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = env(ENV_TOKEN_SECRET).filter(|s| !s.is_empty()) {
        config.token.secret = secret;
    }
    if let Some(addr) = env(ENV_BIND_ADDRESS).filter(|s| !s.is_empty()) {
        config.listener.bind_address = addr;
    }
}
