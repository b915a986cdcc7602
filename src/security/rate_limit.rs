//! Fixed-window rate limiting per client.
//!
//! Each client key gets a counter and the instant its window opened. The first
//! request after a window has elapsed starts a new window with a count of one.
//! Requests beyond `max_requests` inside a window are rejected with 429, and
//! rejected requests still count.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::pipeline::{Flow, Stage};
use crate::http::request::RequestContext;
use crate::http::response::RATE_LIMITED_BODY;
use crate::observability::metrics;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");

/// Identity used to bucket rate-limit counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for a request.
    ///
    /// The first `X-Forwarded-For` entry is only used when `trust_forwarded_for`
    /// is set; otherwise the peer IP is the key.
    pub fn resolve(ctx: &RequestContext, trust_forwarded_for: bool) -> Self {
        if trust_forwarded_for {
            let first = ctx
                .forwarded_for
                .as_deref()
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty());
            if let Some(ip) = first {
                return Self::new(ip);
            }
        }

        match ctx.peer {
            Some(addr) => Self::new(addr.ip().to_string()),
            None => Self::new("unknown"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
    /// Length of a full window.
    pub window: Duration,
}

impl RateLimitDecision {
    /// Seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        self.reset_after.as_secs_f64().ceil() as u64
    }

    /// `RateLimit-Policy` value, e.g. `100;w=60`.
    pub fn policy(&self) -> String {
        format!("{};w={}", self.limit, self.window.as_secs())
    }

    /// Write the `RateLimit-*` headers (and `Retry-After` when denied).
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        if let Ok(policy) = HeaderValue::from_str(&self.policy()) {
            headers.insert(RATELIMIT_POLICY, policy);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
        if !self.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(self.reset_secs()));
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Per-client fixed-window counters.
pub struct FixedWindowLimiter {
    windows: DashMap<ClientKey, Window>,
    window: Duration,
    max_requests: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_requests)
    }

    /// Count a request for `key` now.
    pub fn check(&self, key: &ClientKey) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Count a request for `key` at `now`.
    ///
    /// The entry guard holds the shard lock, so check-and-increment is atomic per key.
    pub fn check_at(&self, key: &ClientKey, now: Instant) -> RateLimitDecision {
        let mut entry = self.windows.entry(key.clone()).or_insert(Window {
            count: 0,
            started: now,
        });

        if entry.count == 0 || now.saturating_duration_since(entry.started) >= self.window {
            entry.count = 1;
            entry.started = now;
        } else {
            entry.count = entry.count.saturating_add(1);
        }

        let elapsed = now.saturating_duration_since(entry.started);
        RateLimitDecision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(elapsed),
            window: self.window,
        }
    }

    /// Drop windows that have already closed. Returns the number removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Pipeline stage guarding the backend route.
pub struct RateLimitStage {
    limiter: Arc<FixedWindowLimiter>,
    standard_headers: bool,
    trust_forwarded_for: bool,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<FixedWindowLimiter>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            standard_headers: config.standard_headers,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn on_request(&self, ctx: &mut RequestContext, request: Request<Body>) -> Flow {
        let key = ClientKey::resolve(ctx, self.trust_forwarded_for);
        let decision = self.limiter.check(&key);
        ctx.rate_limit = Some(decision);

        if decision.allowed {
            return Flow::Continue(request);
        }

        tracing::warn!(
            request_id = %ctx.request_id(),
            client = %key,
            limit = decision.limit,
            reset_secs = decision.reset_secs(),
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();
        Flow::Respond((StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_BODY).into_response())
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if !self.standard_headers {
            return;
        }
        if let Some(decision) = &ctx.rate_limit {
            decision.apply_headers(response.headers_mut());
        }
    }
}
