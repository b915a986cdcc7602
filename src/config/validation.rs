//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, window > 0)
//! - Check the backend URL and path prefix are usable
//! - Check header names and values are legal HTTP
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::UpstreamTarget;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.url {url:?} is invalid: {reason}")]
    UpstreamUrl { url: String, reason: String },

    #[error("upstream.path_prefix {0:?} must start with '/', must not end with '/' and must not be \"/\"")]
    PathPrefix(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} contains invalid header name {name:?}")]
    HeaderName { field: &'static str, name: String },

    #[error("headers.proxy_agent {0:?} is not a valid header value")]
    ProxyAgent(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = UpstreamTarget::parse(&config.upstream.url) {
        errors.push(e);
    }

    let prefix = &config.upstream.path_prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        errors.push(ValidationError::PathPrefix(prefix.clone()));
    }

    let positive = [
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.response_timeout_secs", config.upstream.response_timeout_secs),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.max_requests", u64::from(config.rate_limit.max_requests)),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("security.max_body_bytes", config.security.max_body_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    check_header_names("headers.strip_request", &config.headers.strip_request, &mut errors);
    check_header_names("headers.strip_response", &config.headers.strip_response, &mut errors);

    if HeaderValue::from_str(&config.headers.proxy_agent).is_err() {
        errors.push(ValidationError::ProxyAgent(config.headers.proxy_agent.clone()));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_header_names(field: &'static str, names: &[String], errors: &mut Vec<ValidationError>) {
    for name in names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName {
                field,
                name: name.clone(),
            });
        }
    }
}
