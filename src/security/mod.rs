//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Request under the backend prefix:
//!     → rate_limit.rs (per-client fixed window, 429 on excess)
//!     → headers.rs (strip client identity headers, add x-proxy-agent)
//!     → forwarded to backend
//!
//! Backend response:
//!     → headers.rs (strip server / powered-by / backend rate-limit headers)
//!     → rate_limit.rs (add RateLimit-* headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a denied request never reaches the backend
//! - Header sanitization is best-effort: missing headers are fine
//! - No trust in client input (X-Forwarded-For ignored unless configured)

pub mod headers;
pub mod rate_limit;

pub use headers::{HeaderPolicy, SanitizeStage};
pub use rate_limit::{ClientKey, FixedWindowLimiter, RateLimitDecision, RateLimitStage};
