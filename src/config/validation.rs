//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (TTL > 0, refill period > 0)
//! - Reject signing keys too short for HS256
//! - Keep the idle sweep from resetting buckets that are still refilling
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// Minimum HMAC key length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("token.secret must be at least {min} bytes (got {0})", min = MIN_SECRET_LEN)]
    SecretTooShort(usize),

    #[error("rate_limit.idle_eviction_secs must be 0 or at least {minimum} (got {value})")]
    EvictionTooEager { value: u64, minimum: u64 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.token.secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::SecretTooShort(config.token.secret.len()));
    }

    let positive: [(&'static str, u64); 5] = [
        ("token.ttl_secs", config.token.ttl_secs),
        ("rate_limit.capacity", config.rate_limit.capacity),
        ("rate_limit.refill_tokens", config.rate_limit.refill_tokens),
        ("rate_limit.refill_period_secs", config.rate_limit.refill_period_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    let idle = config.rate_limit.idle_eviction_secs;
    let minimum = config.rate_limit.full_refill_secs();
    if idle > 0 && idle < minimum {
        errors.push(ValidationError::EvictionTooEager { value: idle, minimum });
    }

    if config.upload.max_bytes == 0 {
        errors.push(ValidationError::Zero("upload.max_bytes"));
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}
