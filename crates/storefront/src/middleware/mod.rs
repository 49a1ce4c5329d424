//! HTTP middleware stack for the gateway.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Route guard (redirect anonymous visitors of protected views)

pub mod auth;
pub mod request_id;

pub use auth::route_guard_middleware;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
