//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up global middleware (request ID, tracing, access log,
//!   security headers, CORS, body limit, panic handling)
//! - Assemble the backend pipeline (rate limit → header sanitization → forwarder)
//! - Run the rate-limit sweeper alongside the server
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::http::forward::Forwarder;
use crate::http::pipeline::Pipeline;
use crate::http::request::UuidRequestId;
use crate::http::response;
use crate::observability::{access_log::access_log, metrics};
use crate::routing::{ProxyRouter, RouteMatch, UpstreamTarget};
use crate::security::{FixedWindowLimiter, HeaderPolicy, RateLimitStage, SanitizeStage};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub pipeline: Arc<Pipeline>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    limiter: Arc<FixedWindowLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let target = UpstreamTarget::parse(&config.upstream.url)
            .map_err(|e| ConfigError::Validation(vec![e]))?;
        let policy = HeaderPolicy::from_config(&config.headers)
            .map_err(|e| ConfigError::Validation(vec![e]))?;
        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));

        let mut pipeline = Pipeline::new(Forwarder::new(target, &config.upstream));
        if config.rate_limit.enabled {
            pipeline = pipeline.with_stage(RateLimitStage::new(limiter.clone(), &config.rate_limit));
        }
        pipeline = pipeline.with_stage(SanitizeStage::new(policy));

        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");

        let state = AppState {
            router: Arc::new(ProxyRouter::new(config.upstream.path_prefix.clone())),
            pipeline: Arc::new(pipeline),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers listed later wrap the ones before them, so the request ID is set
    /// first and the panic catcher sits closest to the handler.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state)
            .layer(CatchPanicLayer::custom(response::panic_response))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_bytes));

        let router = if config.security.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        };

        router
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(middleware::from_fn(access_log))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        if self.config.rate_limit.enabled {
            let every = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
            tokio::spawn(sweep_rate_limits(self.limiter.clone(), every, shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, e.g. for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Single entry point for every request.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.router.resolve(request.method(), request.uri()) {
        RouteMatch::Index => response::index(),
        RouteMatch::Upstream(path) => state.pipeline.run(request, path).await,
        RouteMatch::NotFound => {
            tracing::debug!(path = %request.uri().path(), "No route matched");
            response::not_found()
        }
    }
}

/// Periodically drop closed rate-limit windows.
async fn sweep_rate_limits(
    limiter: Arc<FixedWindowLimiter>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.evict_expired(Instant::now());
                metrics::record_rate_limit_keys(limiter.len());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "Evicted expired rate-limit windows");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
