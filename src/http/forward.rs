//! Forwarding to the backend.
//!
//! # Responsibilities
//! - Point the request at the backend URI (prefix already stripped)
//! - Rewrite `Host` to the backend authority
//! - Strip hop-by-hop headers in both directions
//! - Relay the response body as a stream
//!
//! # Design Decisions
//! - Only the wait for response headers is time-bounded; long generations stream freely
//! - No retries: a failed backend call surfaces immediately
//! - Dropping the handler future (client gone) aborts the backend call

use std::error::Error as _;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, uri::PathAndQuery, Request, Version},
    response::Response,
};
use http_body_util::LengthLimitError;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;
use crate::http::request::RequestContext;
use crate::http::response::ProxyError;
use crate::observability::metrics;
use crate::routing::UpstreamTarget;
use crate::security::headers::strip_hop_by_hop;

/// HTTP client bound to the configured backend.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    target: UpstreamTarget,
    response_timeout: Duration,
}

impl Forwarder {
    pub fn new(target: UpstreamTarget, config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            target,
            response_timeout: Duration::from_secs(config.response_timeout_secs),
        }
    }

    /// Send `request` to `path` on the backend and relay the response.
    pub async fn forward(
        &self,
        ctx: &RequestContext,
        request: Request<Body>,
        path: &PathAndQuery,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let uri = self.target.uri_for(path)?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.insert(header::HOST, self.target.host_header().clone());

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .version(Version::HTTP_11)
            .body(body)?;
        *outbound.headers_mut() = headers;

        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %parts.method,
            upstream = %outbound.uri(),
            "Forwarding request"
        );

        let sent = tokio::time::timeout(self.response_timeout, self.client.request(outbound)).await;
        let response: hyper::Response<Incoming> = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if exceeded_body_limit(&e) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    "Request body exceeded the size limit while streaming"
                );
                return Err(ProxyError::PayloadTooLarge);
            }
            Ok(Err(e)) => {
                let kind = if e.is_connect() { "connect" } else { "protocol" };
                tracing::error!(
                    request_id = %ctx.request_id(),
                    upstream = %self.target.url(),
                    kind,
                    error = ?e,
                    "Upstream error"
                );
                metrics::record_upstream_error(kind);
                return Err(ProxyError::Upstream(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    upstream = %self.target.url(),
                    timeout = ?self.response_timeout,
                    "Upstream timed out"
                );
                metrics::record_upstream_error("timeout");
                return Err(ProxyError::UpstreamTimeout(self.response_timeout));
            }
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// True when the client error was caused by `RequestBodyLimitLayer` cutting
/// off a body sent without `Content-Length`.
fn exceeded_body_limit(err: &hyper_util::client::legacy::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}
