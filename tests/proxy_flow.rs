//! End-to-end tests: client → proxy → mock Ollama backend.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Body, body::Bytes, http::StatusCode, routing::post, Router};
use tokio::sync::oneshot;

mod common;

#[tokio::test]
async fn test_index_and_not_found() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;
    let client = common::client();

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert_eq!(res.text().await.unwrap(), "Ollama Proxy Running");

    let res = client.get(proxy.url("/api/tags")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    let body: serde_json::Value = serde_json::from_str(&res.text().await.unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Not Found" }));

    assert!(backend.requests().is_empty(), "nothing should reach the backend");
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_prefix_stripped_and_request_preserved() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;
    let client = common::client();

    let payload = r#"{"model":"llama3","prompt":"hi","stream":false}"#;
    let res = client
        .post(proxy.url("/ollama/api/generate?keep_alive=5m"))
        .header("content-type", "application/json")
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), r#"{"status":"ok"}"#);

    let seen = backend.last();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.uri, "/api/generate?keep_alive=5m");
    assert_eq!(seen.body, payload.as_bytes());
    assert_eq!(seen.headers["content-type"], "application/json");
    assert_eq!(seen.headers["host"], backend.addr.to_string());

    // The bare prefix maps to the backend root
    client.get(proxy.url("/ollama")).send().await.unwrap();
    assert_eq!(backend.last().uri, "/");

    client.delete(proxy.url("/ollama/api/delete")).send().await.unwrap();
    let seen = backend.last();
    assert_eq!(seen.method, "DELETE");
    assert_eq!(seen.uri, "/api/delete");

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_request_headers_sanitized() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;

    common::client()
        .get(proxy.url("/ollama/api/tags"))
        .header("authentication", "secret")
        .header("authorization", "Bearer token")
        .header("origin", "https://evil.example")
        .header("referer", "https://evil.example/page")
        .header("cookie", "session=abc")
        .header("x-forwarded-for", "203.0.113.9")
        .header("via", "1.1 corp-proxy")
        .header("x-custom", "kept")
        .send()
        .await
        .unwrap();

    let headers = backend.last().headers;
    for removed in [
        "authentication",
        "origin",
        "referer",
        "cookie",
        "x-forwarded-for",
        "via",
    ] {
        assert!(!headers.contains_key(removed), "{} reached the backend", removed);
    }
    assert_eq!(headers["authorization"], "Bearer token");
    assert_eq!(headers["x-custom"], "kept");
    assert!(headers["x-proxy-agent"]
        .to_str()
        .unwrap()
        .starts_with("ollama-proxy/"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_response_headers_sanitized() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;

    let res = common::client()
        .get(proxy.url("/ollama/api/tags"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let headers = res.headers();
    assert!(!headers.contains_key("server"));
    assert!(!headers.contains_key("x-powered-by"));
    assert!(!headers.contains_key("x-ratelimit-limit"));
    assert!(!headers.contains_key("x-ratelimit-remaining"));
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");

    // The proxy's own limit replaces whatever the backend reported
    assert_eq!(headers["ratelimit-policy"], "100;w=60");
    assert_eq!(headers["ratelimit-limit"], "100");
    assert_eq!(headers["ratelimit-remaining"], "99");
    assert!(headers.contains_key("ratelimit-reset"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_backend_status_passed_through() {
    let router = Router::new().route(
        "/api/show",
        post(|| async { common::ollama_reply(StatusCode::NOT_FOUND, r#"{"error":"model not found"}"#) }),
    );
    let addr = common::start_backend(router).await;
    let proxy = common::start_proxy(common::proxy_config(&format!("http://{}", addr))).await;

    let res = common::client()
        .post(proxy.url("/ollama/api/show"))
        .body(r#"{"name":"missing"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    assert!(!res.headers().contains_key("server"));
    assert_eq!(res.text().await.unwrap(), r#"{"error":"model not found"}"#);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_response_streams_without_buffering() {
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release = Arc::new(Mutex::new(Some(release_rx)));

    let router = Router::new().route(
        "/api/generate",
        post(move || {
            let rx = release.lock().unwrap().take();
            async move {
                let stream = futures_util::stream::unfold((0u8, rx), |(step, rx)| async move {
                    match step {
                        0 => Some((Ok::<_, Infallible>(Bytes::from_static(b"chunk-1\n")), (1, rx))),
                        1 => {
                            if let Some(rx) = rx {
                                let _ = rx.await;
                            }
                            Some((Ok(Bytes::from_static(b"chunk-2\n")), (2, None)))
                        }
                        _ => None,
                    }
                });
                Body::from_stream(stream)
            }
        }),
    );
    let addr = common::start_backend(router).await;
    let proxy = common::start_proxy(common::proxy_config(&format!("http://{}", addr))).await;

    let mut res = common::client()
        .post(proxy.url("/ollama/api/generate"))
        .body(r#"{"model":"llama3","prompt":"hi"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    // The first chunk must arrive while the backend is still holding the second
    let first = tokio::time::timeout(Duration::from_secs(3), res.chunk())
        .await
        .expect("first chunk was buffered")
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b"chunk-1\n");

    release_tx.send(()).unwrap();

    let mut rest = Vec::new();
    while let Some(chunk) = res.chunk().await.unwrap() {
        rest.extend_from_slice(&chunk);
    }
    assert_eq!(rest, b"chunk-2\n");

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_rate_limit_after_max_requests() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;
    let client = common::client();

    for i in 0..100u32 {
        let res = client.get(proxy.url("/ollama/api/tags")).send().await.unwrap();
        assert_eq!(res.status(), 200, "request {} should pass", i + 1);
        assert_eq!(
            res.headers()["ratelimit-remaining"],
            (99 - i).to_string().as_str()
        );
    }

    let res = client.get(proxy.url("/ollama/api/tags")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["ratelimit-remaining"], "0");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(
        res.text().await.unwrap(),
        "Too many requests, please try again later."
    );

    assert_eq!(backend.requests().len(), 100);

    // The index is not limited
    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_forwarded_for_only_trusted_when_enabled() {
    let backend = common::start_echo_backend().await;
    let client = common::client();

    let mut config = common::proxy_config(&backend.url());
    config.rate_limit.max_requests = 1;
    let proxy = common::start_proxy(config.clone()).await;

    // Spoofed addresses do not buy extra requests
    for (ip, status) in [("203.0.113.1", 200), ("203.0.113.2", 429)] {
        let res = client
            .get(proxy.url("/ollama/api/tags"))
            .header("x-forwarded-for", ip)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), status);
    }
    proxy.shutdown.trigger();

    config.rate_limit.trust_forwarded_for = true;
    let proxy = common::start_proxy(config).await;

    for ip in ["203.0.113.1", "203.0.113.2"] {
        let res = client
            .get(proxy.url("/ollama/api/tags"))
            .header("x-forwarded-for", format!("{}, 10.0.0.1", ip))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "{} has its own window", ip);
    }
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_propagated() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;
    let client = common::client();

    let res = client
        .get(proxy.url("/ollama/api/tags"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");
    assert_eq!(backend.last().headers["x-request-id"], "abc-123");

    let res = client.get(proxy.url("/ollama/api/tags")).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());
    assert_eq!(backend.last().headers["x-request-id"], generated.as_str());

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let backend = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&backend.url())).await;

    {
        let client = common::client();
        let res = client.get(proxy.url("/")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    proxy.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), proxy.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
