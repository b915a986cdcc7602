//! Response construction and error mapping.
//!
//! # Responsibilities
//! - Canned responses for the index and not-found routes
//! - Map proxy errors to HTTP status codes with generic bodies
//! - Turn handler panics into a 500
//!
//! # Design Decisions
//! - Error detail is logged, never sent to the client
//! - Backend connection failures → 502, backend timeouts → 504
//! - A request body cut off by the size limit while streaming → 413

use std::any::Any;
use std::time::Duration;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub const INDEX_BODY: &str = "Ollama Proxy Running";
pub const INTERNAL_ERROR_BODY: &str = "Something went wrong";
pub const RATE_LIMITED_BODY: &str = "Too many requests, please try again later.";
pub const BAD_GATEWAY_BODY: &str = "Upstream request failed";
pub const GATEWAY_TIMEOUT_BODY: &str = "Upstream request timed out";
pub const PAYLOAD_TOO_LARGE_BODY: &str = "Request body too large";

/// Errors raised while handling a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The backend could not be reached or dropped the connection.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The backend did not send response headers in time.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// The outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    /// The client's body went over `max_body_bytes` mid-stream.
    #[error("request body exceeded the configured limit")]
    PayloadTooLarge,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = match &self {
            ProxyError::Upstream(_) => BAD_GATEWAY_BODY,
            ProxyError::UpstreamTimeout(_) => GATEWAY_TIMEOUT_BODY,
            ProxyError::PayloadTooLarge => PAYLOAD_TOO_LARGE_BODY,
            ProxyError::Request(_) => {
                tracing::error!(error = %self, "Unhandled error");
                INTERNAL_ERROR_BODY
            }
        };
        (self.status(), body).into_response()
    }
}

/// `GET /`.
pub fn index() -> Response {
    (StatusCode::OK, INDEX_BODY).into_response()
}

/// Fallback for unmatched routes.
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not Found" })),
    )
        .into_response()
}

/// Response used by the panic-catching layer.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> axum::http::Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
}
