//! HTTP route handlers for the gateway.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Health check
//!
//! # Auth
//! POST /api/auth/signin              - Forward, set authToken cookie
//! POST /api/auth/signout             - Expire authToken cookie
//! POST /api/auth/signup              - Forward
//!
//! # Forwarded to the backend (cookie promoted to bearer token)
//! *    /api/cart[/...]
//! GET  /api/addresses                - Bare arrays wrapped as { addresses }
//! *    /api/addresses[/...]
//! *    /api/orders[/...]
//! *    /api/payment-methods[/...]
//! *    /api/products[/...]
//!
//! # Everything else
//! GET  /*                            - SPA assets, behind the route guard
//! ```

pub mod auth;
pub mod proxy;

use axum::{
    Router,
    routing::{any, get, post},
};

use crate::state::AppState;

/// Backend resources forwarded as-is, with and without a sub-path.
const FORWARDED: [&str; 5] = [
    "/api/cart",
    "/api/addresses",
    "/api/orders",
    "/api/payment-methods",
    "/api/products",
];

/// Create the `/api` router.
pub fn api_routes() -> Router<AppState> {
    let router = Router::new()
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/signup", post(proxy::forward))
        .route(
            "/api/addresses",
            get(proxy::list_addresses).fallback(proxy::forward),
        );

    FORWARDED.iter().fold(router, |router, base| {
        let router = router.route(&format!("{base}/{{*rest}}"), any(proxy::forward));
        if *base == "/api/addresses" {
            router
        } else {
            router.route(base, any(proxy::forward))
        }
    })
}

/// Liveness health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
}
