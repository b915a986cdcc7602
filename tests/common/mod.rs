//! Shared utilities for integration tests: mock Ollama backends and a proxy
//! running on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ollama_proxy::config::ProxyConfig;
use ollama_proxy::http::HttpServer;
use ollama_proxy::lifecycle::Shutdown;

/// What the backend saw for one request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests().pop().expect("backend saw no requests")
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A backend that records every request and answers with a small JSON body
/// plus the implementation headers the proxy is expected to strip.
pub async fn start_echo_backend() -> MockBackend {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let router = Router::new().fallback(move |request: Request| {
        let sink = sink.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            sink.lock().unwrap().push(Captured {
                method: parts.method.to_string(),
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body: body.to_vec(),
            });
            ollama_reply(StatusCode::OK, r#"{"status":"ok"}"#)
        }
    });

    let addr = start_backend(router).await;
    MockBackend { addr, captured }
}

/// A JSON reply decorated like a real Ollama deployment behind a gateway.
pub fn ollama_reply(status: StatusCode, body: &'static str) -> Response {
    (
        status,
        [
            ("content-type", "application/json"),
            ("server", "ollama-mock/0.1"),
            ("x-powered-by", "Go"),
            ("x-ratelimit-limit", "999"),
            ("x-ratelimit-remaining", "998"),
            ("ratelimit-remaining", "5"),
            ("ratelimit-policy", "5;w=1"),
        ],
        Body::from(body),
    )
        .into_response()
}

/// A backend address with nothing listening on it.
pub fn closed_backend_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Proxy config pointed at `upstream_url`.
pub fn proxy_config(upstream_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.url = upstream_url.to_string();
    config
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).expect("test config is valid");
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
