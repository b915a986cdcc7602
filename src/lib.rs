//! Ollama Proxy Library
//!
//! A small reverse proxy that exposes an Ollama server under `/ollama`,
//! with per-client rate limiting and header sanitization.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
