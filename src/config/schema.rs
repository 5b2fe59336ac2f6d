//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Development or production. Controls error verbosity and log format.
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Admission control (fixed-window rate limiting).
    pub rate_limit: RateLimitConfig,

    /// Input sanitization.
    pub sanitizer: SanitizerConfig,

    /// Query-parameter pollution policy.
    pub parameter_pollution: ParameterPollutionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment `{}`", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Take the client key from the first `X-Forwarded-For` entry.
    /// Only enable behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            trust_forwarded_for: false,
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

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024, // 10KB
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Only paths under this prefix are counted.
    pub gated_prefix: String,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Requests allowed per client per window.
    pub capacity: u32,

    /// Upper bound on tracked client keys. Least recently seen is evicted.
    pub max_tracked_clients: usize,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gated_prefix: "/api".to_string(),
            window_secs: 60 * 60,
            capacity: 100,
            max_tracked_clients: 10_000,
        }
    }
}

/// Input sanitization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Keys starting with this character are dropped.
    pub operator_marker: char,

    /// Also drop keys containing a `.`.
    pub strip_dotted_keys: bool,

    /// Containers nested deeper than this are replaced with null.
    pub max_depth: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            operator_marker: '$',
            strip_dotted_keys: true,
            max_depth: 32,
        }
    }
}

/// HTTP parameter pollution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterPollutionConfig {
    /// Parameters allowed to carry multiple values.
    pub whitelist: BTreeSet<String>,
}

impl Default for ParameterPollutionConfig {
    fn default() -> Self {
        let whitelist = [
            "duration",
            "difficulty",
            "ratingsAverage",
            "ratingsQuantity",
            "price",
        ];
        Self {
            whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error).
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
