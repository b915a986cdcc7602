//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every section carries defaults so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Backend the prefix route forwards to.
    pub upstream: UpstreamConfig,

    /// Fixed-window rate limiting on the prefix route.
    pub rate_limit: RateLimitConfig,

    /// Header denylists applied in each direction.
    pub headers: HeaderConfig,

    /// CORS and request size limits.
    pub security: SecurityConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

/// Backend (Ollama) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the backend, e.g. "http://localhost:11434".
    pub url: String,

    /// Path prefix that is routed to the backend and stripped before forwarding.
    pub path_prefix: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for the backend to send response headers, in seconds.
    /// The response body itself is streamed without a deadline.
    pub response_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            path_prefix: "/ollama".to_string(),
            connect_timeout_secs: 5,
            response_timeout_secs: 300,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on the prefix route.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per client per window.
    pub max_requests: u32,

    /// Emit `RateLimit-*` headers on limited routes.
    pub standard_headers: bool,

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer address.
    pub trust_forwarded_for: bool,

    /// How often expired windows are swept from memory, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 100,
            standard_headers: true,
            trust_forwarded_for: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Header sanitization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Headers removed from requests before they reach the backend.
    pub strip_request: Vec<String>,

    /// Headers removed from backend responses before they reach the client.
    pub strip_response: Vec<String>,

    /// Value of the `x-proxy-agent` header sent to the backend.
    pub proxy_agent: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        let strip_request = [
            "authentication",
            "origin",
            "referer",
            "cookie",
            "x-forwarded-for",
            "via",
        ];
        let strip_response = [
            "server",
            "x-powered-by",
            "x-ratelimit-limit",
            "x-ratelimit-remaining",
            "x-ratelimit-reset",
            "ratelimit-limit",
            "ratelimit-remaining",
            "ratelimit-reset",
            "ratelimit-policy",
        ];
        Self {
            strip_request: strip_request.iter().map(|h| h.to_string()).collect(),
            strip_response: strip_response.iter().map(|h| h.to_string()).collect(),
            proxy_agent: concat!("ollama-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Answer CORS requests permissively (any origin, method, header).
    pub cors_enabled: bool,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_enabled: true,
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Prometheus endpoint bind address; metrics are disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
