//! QuickCommerce storefront library.
//!
//! Two halves share this crate:
//!
//! - The shopper-side client: [`api::ApiClient`] for the REST backend, the
//!   [`auth::AuthGate`], the [`cart::CartStore`] and [`checkout`], wired
//!   together by [`Storefront`]
//! - The web gateway: [`app`] serves the SPA, guards protected views and
//!   forwards `/api` calls to the backend

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
mod storefront;

pub use storefront::Storefront;

use axum::{Router, extract::Request, middleware::from_fn};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the gateway router.
///
/// Unknown paths fall back to the SPA's `index.html` so client-side routes
/// load. Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let static_dir = state.config().static_dir.clone();
    let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    routes::routes()
        .fallback_service(spa)
        .layer(from_fn(middleware::route_guard_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}
