//! Configuration loading from disk and the environment.
//!
//! Precedence: built-in defaults, then the optional TOML file, then
//! environment variables.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{LogFormat, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    Env { key: &'static str, value: String },

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

/// Load configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => from_file(path)?,
        None => ProxyConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without validating it.
pub fn from_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so callers can supply their own source.
pub fn apply_env<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = parse_var(&lookup, "PORT")? {
        config.listener.port = port;
    }
    if let Some(host) = lookup("HOST") {
        config.listener.host = host;
    }
    if let Some(url) = lookup("OLLAMA_URL") {
        config.upstream.url = url;
    }
    if let Some(prefix) = lookup("PROXY_PREFIX") {
        config.upstream.path_prefix = prefix;
    }
    if let Some(secs) = parse_var(&lookup, "UPSTREAM_CONNECT_TIMEOUT_SECS")? {
        config.upstream.connect_timeout_secs = secs;
    }
    if let Some(secs) = parse_var(&lookup, "UPSTREAM_RESPONSE_TIMEOUT_SECS")? {
        config.upstream.response_timeout_secs = secs;
    }
    if let Some(enabled) = parse_flag(&lookup, "RATE_LIMIT_ENABLED")? {
        config.rate_limit.enabled = enabled;
    }
    if let Some(secs) = parse_var(&lookup, "RATE_LIMIT_WINDOW_SECS")? {
        config.rate_limit.window_secs = secs;
    }
    if let Some(max) = parse_var(&lookup, "RATE_LIMIT_MAX")? {
        config.rate_limit.max_requests = max;
    }
    if let Some(enabled) = parse_flag(&lookup, "RATE_LIMIT_STANDARD_HEADERS")? {
        config.rate_limit.standard_headers = enabled;
    }
    if let Some(trust) = parse_flag(&lookup, "TRUST_FORWARDED_FOR")? {
        config.rate_limit.trust_forwarded_for = trust;
    }
    if let Some(enabled) = parse_flag(&lookup, "CORS_ENABLED")? {
        config.security.cors_enabled = enabled;
    }
    if let Some(bytes) = parse_var(&lookup, "MAX_BODY_BYTES")? {
        config.security.max_body_bytes = bytes;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    key: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }
    if let Some(addr) = lookup("METRICS_ADDR") {
        config.observability.metrics_address = (!addr.is_empty()).then_some(addr);
    }

    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value }),
        None => Ok(None),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Env { key, value }),
        },
        None => Ok(None),
    }
}
