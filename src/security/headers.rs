//! Header sanitization.
//!
//! # Responsibilities
//! - Remove client identity headers before they reach the backend
//! - Tag outbound requests with `x-proxy-agent`
//! - Remove backend implementation details from responses
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Denylists are compiled to `HeaderName`s once at startup
//! - Removing an absent header is a no-op, never an error

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    response::Response,
};

use crate::config::{HeaderConfig, ValidationError};
use crate::http::pipeline::{Flow, Stage};
use crate::http::request::RequestContext;

/// Header identifying the proxy to the backend.
pub const X_PROXY_AGENT: HeaderName = HeaderName::from_static("x-proxy-agent");

/// Headers that only apply to a single transport hop (RFC 9110 §7.6.1).
static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Compiled header denylists.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    strip_request: Vec<HeaderName>,
    strip_response: Vec<HeaderName>,
    proxy_agent: HeaderValue,
}

impl HeaderPolicy {
    pub fn from_config(config: &HeaderConfig) -> Result<Self, ValidationError> {
        let compile = |field: &'static str, names: &[String]| {
            names
                .iter()
                .map(|name| {
                    HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                        ValidationError::HeaderName {
                            field,
                            name: name.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            strip_request: compile("headers.strip_request", &config.strip_request)?,
            strip_response: compile("headers.strip_response", &config.strip_response)?,
            proxy_agent: HeaderValue::from_str(&config.proxy_agent)
                .map_err(|_| ValidationError::ProxyAgent(config.proxy_agent.clone()))?,
        })
    }

    /// Client → backend.
    pub fn sanitize_request(&self, headers: &mut HeaderMap) {
        for name in &self.strip_request {
            headers.remove(name);
        }
        headers.insert(X_PROXY_AGENT, self.proxy_agent.clone());
    }

    /// Backend → client.
    pub fn sanitize_response(&self, headers: &mut HeaderMap) {
        for name in &self.strip_response {
            headers.remove(name);
        }
    }
}

/// Pipeline stage applying a `HeaderPolicy` in both directions.
pub struct SanitizeStage {
    policy: HeaderPolicy,
}

impl SanitizeStage {
    pub fn new(policy: HeaderPolicy) -> Self {
        Self { policy }
    }
}

impl Stage for SanitizeStage {
    fn name(&self) -> &'static str {
        "sanitize_headers"
    }

    fn on_request(&self, _ctx: &mut RequestContext, mut request: Request<Body>) -> Flow {
        self.policy.sanitize_request(request.headers_mut());
        Flow::Continue(request)
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
        self.policy.sanitize_response(response.headers_mut());
    }
}
