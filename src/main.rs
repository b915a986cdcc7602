//! Ollama Proxy
//!
//! Exposes a local Ollama server under `/ollama` with per-client rate
//! limiting and header sanitization.
//!
//! ```text
//!     Client ──▶ request id ─▶ access log ─▶ security headers ─▶ dispatch
//!                                                                  │
//!                 ┌─────────────────────┬──────────────────────────┤
//!                 ▼                     ▼                          ▼
//!              GET /              /ollama/* pipeline           not found
//!        "Ollama Proxy Running"   rate limit → sanitize        404 JSON
//!                                  → forward ──────────▶ Ollama
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ollama_proxy::config::load_config;
use ollama_proxy::lifecycle::{wait_for_signal, Shutdown};
use ollama_proxy::observability::{logging, metrics};
use ollama_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "ollama-proxy")]
#[command(version, about = "Rate-limited reverse proxy for Ollama", long_about = None)]
struct Cli {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        upstream = %config.upstream.url,
        prefix = %config.upstream.path_prefix,
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.metrics_address {
        let addr: SocketAddr = addr.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("Ollama Proxy Live at http://{}", local_addr);
    if local_addr.ip().is_unspecified() {
        tracing::info!(
            "Listening on all interfaces; reach it at http://localhost:{}",
            local_addr.port()
        );
    }
    tracing::info!(
        "Forwarding {}/* to {}",
        config.upstream.path_prefix,
        config.upstream.url
    );

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            shutdown.trigger();
        }
    });

    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
