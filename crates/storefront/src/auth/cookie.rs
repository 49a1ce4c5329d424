//! The mirrored `authToken` cookie.
//!
//! The gateway cannot see the SPA's in-memory token, so sign-in also sets a
//! cookie the route guard and API forwarding can read.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use secrecy::{ExposeSecret, SecretString};
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};

/// Cookie name shared with the SPA.
pub const AUTH_COOKIE_NAME: &str = "authToken";

/// Lifetime without remember-me.
pub const SESSION_COOKIE_DAYS: i64 = 1;

/// Lifetime with remember-me.
pub const REMEMBER_ME_COOKIE_DAYS: i64 = 30;

/// `authToken=<token>; Path=/; SameSite=Lax` expiring in 1 or 30 days.
#[must_use]
pub fn auth_cookie(token: &SecretString, remember_me: bool, secure: bool) -> Cookie<'static> {
    let days = if remember_me {
        REMEMBER_ME_COOKIE_DAYS
    } else {
        SESSION_COOKIE_DAYS
    };

    Cookie::build((AUTH_COOKIE_NAME, token.expose_secret().to_owned()))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(days))
        .build()
}

/// A cookie that expires `authToken` immediately.
#[must_use]
pub fn expired_auth_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((AUTH_COOKIE_NAME, ""))
        .path("/")
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

/// The `authToken` value from a request's `Cookie` headers, if non-empty.
#[must_use]
pub fn token_from_headers(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == AUTH_COOKIE_NAME && !cookie.value().is_empty())
        .map(|cookie| SecretString::from(cookie.value().to_owned()))
}
