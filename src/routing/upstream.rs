//! Backend target abstraction.
//!
//! # Responsibilities
//! - Parse and pre-compute the backend base URL once at startup
//! - Build the absolute URI for each forwarded request
//! - Provide the `Host` value used when rewriting the origin

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Uri};
use url::Url;

use crate::config::ValidationError;

/// The single backend the proxy forwards to.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// Original URL, kept for logging.
    url: Url,
    authority: Authority,
    /// Base path without trailing slash; empty when the URL has no path.
    base_path: String,
    host: HeaderValue,
}

impl UpstreamTarget {
    /// Parse a backend base URL such as `http://localhost:11434`.
    ///
    /// Only plain `http` is accepted; the forwarding client has no TLS connector.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::UpstreamUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http:// backends are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }

        let authority_str = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority =
            Authority::try_from(authority_str.as_str()).map_err(|e| invalid(&e.to_string()))?;
        let host = HeaderValue::from_str(&authority_str).map_err(|e| invalid(&e.to_string()))?;
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            url,
            authority,
            base_path,
            host,
        })
    }

    /// Absolute URI for a request whose prefix has already been stripped.
    pub fn uri_for(&self, path: &PathAndQuery) -> Result<Uri, axum::http::Error> {
        let full = if self.base_path.is_empty() {
            path.as_str().to_string()
        } else {
            format!("{}{}", self.base_path, path.as_str())
        };

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(full)
            .build()
    }

    /// `Host` header value presented to the backend.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
