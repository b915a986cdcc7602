//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, global layers, dispatch)
//!     → request.rs (request ID, per-request context)
//!     → [routing decides index / backend / not found]
//!     → pipeline.rs (rate limit, header sanitization)
//!     → forward.rs (send to backend, stream the reply)
//!     → response.rs (canned responses, error mapping)
//!     → Send to client
//! ```

pub mod forward;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{Flow, Pipeline, Stage};
pub use request::{RequestContext, UuidRequestId, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::HttpServer;
