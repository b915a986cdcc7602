//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Decide which of the three routes a request belongs to
//! - Return an explicit match rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - The backend prefix is checked before the index route
//! - Explicit NotFound rather than falling through to the backend

use axum::http::uri::PathAndQuery;
use axum::http::{Method, Uri};

use crate::routing::matcher::PathPrefixMatcher;

/// Outcome of route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    /// `GET /` informational page.
    Index,
    /// Under the backend prefix; carries the rewritten path and query.
    Upstream(PathAndQuery),
    /// Nothing matched.
    NotFound,
}

/// Compiled routing table.
#[derive(Debug, Clone)]
pub struct ProxyRouter {
    upstream: PathPrefixMatcher,
}

impl ProxyRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            upstream: PathPrefixMatcher::new(prefix),
        }
    }

    /// Resolve a request to a route.
    pub fn resolve(&self, method: &Method, uri: &Uri) -> RouteMatch {
        if let Some(path) = self.upstream.strip(uri) {
            return RouteMatch::Upstream(path);
        }

        if uri.path() == "/" && (*method == Method::GET || *method == Method::HEAD) {
            RouteMatch::Index
        } else {
            RouteMatch::NotFound
        }
    }
}
