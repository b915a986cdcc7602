//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (prefix match + rewrite)
//!     → Return: Index, Upstream(rewritten path) or NotFound
//!
//! Upstream(rewritten path)
//!     → upstream.rs (absolute backend URI + Host)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;
pub mod upstream;

pub use router::{ProxyRouter, RouteMatch};
pub use upstream::UpstreamTarget;
