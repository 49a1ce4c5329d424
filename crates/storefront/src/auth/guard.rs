//! Protected-route rules.
//!
//! A path is protected when it equals one of [`PROTECTED_PREFIXES`] or
//! continues it with `/`. Unauthenticated visitors of a protected path are
//! sent to the login page with the original path preserved.

/// Views that require a signed-in shopper.
pub const PROTECTED_PREFIXES: [&str; 4] = ["/account", "/checkout", "/orders", "/profile"];

/// Login page the guard redirects to.
pub const LOGIN_PATH: &str = "/login";

/// Whether `path` needs authentication. API calls never do; the backend
/// answers those itself.
#[must_use]
pub fn is_protected(path: &str) -> bool {
    if path == "/api" || path.starts_with("/api/") {
        return false;
    }
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// `/login?redirect=<path>` with the path percent-encoded.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_and_subpaths_are_protected() {
        for path in ["/account", "/checkout", "/checkout/step", "/orders/12", "/profile/"] {
            assert!(is_protected(path), "{path}");
        }
    }

    #[test]
    fn test_lookalikes_and_public_paths_pass() {
        for path in ["/", "/login", "/products/3", "/accounting", "/checkouts", "/api/cart", "/api/orders"] {
            assert!(!is_protected(path), "{path}");
        }
    }

    #[test]
    fn test_login_redirect_encodes_path() {
        assert_eq!(
            login_redirect("/checkout/step"),
            "/login?redirect=%2Fcheckout%2Fstep"
        );
    }
}
