//! Request logging middleware.
//!
//! Writes a diagnostic block when a request arrives and a single access line
//! when it completes:
//!
//! ```text
//! 2024-05-01T10:00:00.123Z - 10.0.0.7 - "POST /ollama/api/generate" - Status 200 - 812.402 ms
//! ```

use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, Method, Uri},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::http::request::RequestContext;
use crate::observability::metrics;

/// Middleware creating the `RequestContext` and logging the request.
pub async fn access_log(mut request: Request, next: Next) -> Response {
    let mut ctx = RequestContext::from_request(&request);
    let method = request.method().clone();
    let uri = request.uri().clone();

    if !ctx.visit_logged && !uri.path().ends_with("favicon.ico") {
        log_visit(&ctx, &request);
        ctx.visit_logged = true;
    }

    request.extensions_mut().insert(ctx.clone());
    let response = next.run(request).await;

    let status = response.status().as_u16();
    let client = ctx
        .peer
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let line = format_access_line(
        Utc::now(),
        &client,
        &method,
        &uri,
        status,
        ctx.started.elapsed(),
    );
    tracing::info!(target: "ollama_proxy::access", request_id = %ctx.request_id(), "{}", line);
    metrics::record_request(method.as_str(), status, ctx.started);

    response
}

/// Format one access line.
pub fn format_access_line(
    at: DateTime<Utc>,
    client: &str,
    method: &Method,
    uri: &Uri,
    status: u16,
    elapsed: Duration,
) -> String {
    format!(
        "{} - {} - \"{} {}\" - Status {} - {:.3} ms",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        client,
        method,
        uri,
        status,
        elapsed.as_secs_f64() * 1000.0
    )
}

fn log_visit(ctx: &RequestContext, request: &Request) {
    let header = |name: header::HeaderName, fallback: &'static str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(fallback)
            .to_string()
    };

    tracing::info!(
        target: "ollama_proxy::visit",
        timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        client = %ctx.client_display(),
        user_agent = %header(header::USER_AGENT, "Unknown"),
        language = %header(header::ACCEPT_LANGUAGE, "Unknown"),
        referer = %header(header::REFERER, "Direct"),
        request_id = %ctx.request_id(),
        "{} {}",
        request.method(),
        request.uri()
    );
}
