//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, capacity > 0, limits > 0)
//! - Validate address and prefix formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    let rate = &config.rate_limit;
    if rate.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rate.capacity == 0 {
        errors.push(ValidationError::new("rate_limit.capacity", "must be greater than 0"));
    }
    if rate.max_tracked_clients == 0 {
        errors.push(ValidationError::new(
            "rate_limit.max_tracked_clients",
            "must be greater than 0",
        ));
    }
    if !rate.gated_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            "rate_limit.gated_prefix",
            format!("`{}` must start with '/'", rate.gated_prefix),
        ));
    }

    let sanitizer = &config.sanitizer;
    if sanitizer.max_depth == 0 {
        errors.push(ValidationError::new("sanitizer.max_depth", "must be greater than 0"));
    }
    if sanitizer.operator_marker.is_alphanumeric() || sanitizer.operator_marker.is_whitespace() {
        errors.push(ValidationError::new(
            "sanitizer.operator_marker",
            format!("`{}` would strip ordinary keys", sanitizer.operator_marker),
        ));
    }

    if config
        .parameter_pollution
        .whitelist
        .iter()
        .any(|name| name.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "parameter_pollution.whitelist",
            "contains an empty parameter name",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
