//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → access_log.rs (diagnostic block + one access line, RequestContext)
//!     → metrics.rs (counters, histograms)
//!
//! Startup:
//!     → logging.rs (tracing subscriber, pretty or JSON)
//!     → metrics.rs (Prometheus exporter, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging via `tracing`; request ID on every proxy log line
//! - Metrics are cheap (no-ops until an exporter is installed)

pub mod access_log;
pub mod logging;
pub mod metrics;
