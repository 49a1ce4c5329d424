//! Route guard middleware.
//!
//! Anonymous requests for protected views are redirected to the login page
//! with the original path preserved. "Anonymous" means no `authToken` cookie;
//! the token itself is checked by the backend on the API calls the view makes.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::cookie::token_from_headers;
use crate::auth::guard::{is_protected, login_redirect};

/// Rejection for an anonymous request to a protected view.
pub struct AuthRejection {
    location: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        Redirect::temporary(&self.location).into_response()
    }
}

/// Redirect anonymous visitors of protected paths to `/login?redirect=...`.
///
/// # Errors
///
/// Returns [`AuthRejection`] for an anonymous request to a protected path.
pub async fn route_guard_middleware(request: Request, next: Next) -> Result<Response, AuthRejection> {
    let path = request.uri().path();
    if is_protected(path) && token_from_headers(request.headers()).is_none() {
        tracing::debug!(path, "Anonymous request for protected view");
        return Err(AuthRejection {
            location: login_redirect(path),
        });
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{self, StatusCode, header},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/checkout/step", get(|| async { "checkout" }))
            .route("/api/cart", get(|| async { "cart" }))
            .layer(middleware::from_fn(route_guard_middleware))
    }

    #[tokio::test]
    async fn test_anonymous_protected_request_redirects() {
        let response = app()
            .oneshot(http::Request::get("/checkout/step").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?redirect=%2Fcheckout%2Fstep"
        );
    }

    #[tokio::test]
    async fn test_cookie_lets_request_through() {
        let request = http::Request::get("/checkout/step")
            .header(header::COOKIE, "theme=dark; authToken=abc")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_paths_are_never_redirected() {
        let response = app()
            .oneshot(http::Request::get("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
