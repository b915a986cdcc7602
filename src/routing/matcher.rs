//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix on a segment boundary
//! - Strip the prefix, keeping the query string
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/prefix` and `/prefix/...` match; `/prefixed` does not
//! - No regex to guarantee O(n) matching

use axum::http::uri::PathAndQuery;
use axum::http::Uri;

/// Matches the request path prefix and rewrites it away.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if the path falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.remainder(path).is_some()
    }

    /// Strip the prefix from `uri`, returning the path and query to send upstream.
    ///
    /// `/ollama` becomes `/`, `/ollama/api/tags?x=1` becomes `/api/tags?x=1`.
    pub fn strip(&self, uri: &Uri) -> Option<PathAndQuery> {
        let rest = self.remainder(uri.path())?;
        let path = if rest.is_empty() { "/" } else { rest };

        let rewritten = match uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };
        PathAndQuery::try_from(rewritten).ok()
    }

    fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}
