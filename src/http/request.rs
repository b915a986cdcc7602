//! Request identification and per-request context.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Build the `RequestContext` that travels with each request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Per-request state lives in request extensions, never in transport headers

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::security::rate_limit::RateLimitDecision;

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// State attached to a single request as it moves through the proxy.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Value of `x-request-id`, if present.
    pub request_id: Option<String>,
    /// Address of the directly connected peer.
    pub peer: Option<SocketAddr>,
    /// Raw `X-Forwarded-For` header as received.
    pub forwarded_for: Option<String>,
    /// When the proxy started handling the request.
    pub started: Instant,
    /// Set once the diagnostic block for this request has been written.
    pub visit_logged: bool,
    /// Outcome of the rate-limit check, when the route is limited.
    pub rate_limit: Option<RateLimitDecision>,
}

impl RequestContext {
    /// Capture the context of an incoming request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            request_id: header(X_REQUEST_ID.as_str()),
            peer: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            forwarded_for: header("x-forwarded-for"),
            started: Instant::now(),
            visit_logged: false,
            rate_limit: None,
        }
    }

    /// Client address as shown in logs: forwarded-for when present, else the peer IP.
    pub fn client_display(&self) -> String {
        if let Some(forwarded) = &self.forwarded_for {
            return forwarded.clone();
        }
        self.peer
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    /// Request ID for log fields.
    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("unknown")
    }
}
