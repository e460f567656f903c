//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the user service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Bearer token signing settings.
    pub token: TokenConfig,

    /// Login rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Avatar upload handling.
    pub upload: UploadConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC-SHA256 key. At least 32 bytes. No default: supply it in the
    /// file or through `USER_SERVICE_TOKEN_SECRET`.
    pub secret: String,

    /// Token lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Rate limiting configuration for login attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum tokens a bucket holds.
    pub capacity: u64,

    /// Tokens granted every refill period.
    pub refill_tokens: u64,

    /// Length of a refill period in seconds.
    pub refill_period_secs: u64,

    /// Drop buckets idle for this many seconds. 0 keeps them forever.
    /// Must cover a full refill from empty, see [`Self::full_refill_secs`].
    pub idle_eviction_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_tokens: 5,
            refill_period_secs: 15 * 60,
            idle_eviction_secs: 0,
        }
    }
}

impl RateLimitConfig {
    /// Seconds an empty bucket needs to refill to capacity.
    pub fn full_refill_secs(&self) -> u64 {
        if self.refill_tokens == 0 {
            return u64::MAX;
        }
        self.capacity
            .div_ceil(self.refill_tokens)
            .saturating_mul(self.refill_period_secs)
    }
}

/// Avatar upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory accepted avatars are written to.
    pub dir: String,

    /// Maximum accepted file size in bytes.
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads/avatars".to_string(),
            max_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
