//! Auth Gate: the bearer credential and the authentication flag.
//!
//! State machine:
//!
//! ```text
//! Anonymous --sign_in--> Authenticating --ok--> Authenticated
//!     ^                        |                      |
//!     +-------- failure -------+------- sign_out -----+
//! ```
//!
//! Every transition is published on a `watch` channel. The API client reads
//! the token from that channel and the cart store subscribes to it to switch
//! between guest and synced mode.

pub mod cookie;
pub mod guard;

use std::sync::Arc;

use quickcommerce_core::{Email, EmailError};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;

use crate::api::{ApiClient, ApiError, SignInRequest, SignUpRequest};

/// Minimum password length accepted for new accounts.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors from sign-in and sign-up.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The email failed validation; no request was sent.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The password was empty; no request was sent.
    #[error("Password is required")]
    MissingPassword,

    /// The new password is too short; no request was sent.
    #[error("Password must be at least 6 characters")]
    WeakPassword,

    /// The name was empty; no request was sent.
    #[error("Name is required")]
    MissingName,

    /// The backend rejected the request or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Message safe to show to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) if err.status().is_some_and(|s| s.as_u16() == 401) => {
                "Invalid email or password".to_string()
            }
            Self::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// A signed-in session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    token: SecretString,
    email: Option<Email>,
    remember_me: bool,
}

impl AuthSession {
    /// Create a session from a bearer token.
    #[must_use]
    pub const fn new(token: SecretString, email: Option<Email>, remember_me: bool) -> Self {
        Self {
            token,
            email,
            remember_me,
        }
    }

    /// Bearer token.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub const fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    /// Whether the session should outlive the browser session.
    #[must_use]
    pub const fn remember_me(&self) -> bool {
        self.remember_me
    }
}

/// Current authentication state.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated(AuthSession),
}

impl AuthState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

/// Create the channel an [`AuthGate`] publishes on.
///
/// The receiver goes to [`ApiClient::new`], the sender to [`AuthGate::new`].
#[must_use]
pub fn channel() -> (watch::Sender<AuthState>, watch::Receiver<AuthState>) {
    watch::channel(AuthState::Anonymous)
}

/// Holds the authentication state and performs sign-in/out.
#[derive(Clone)]
pub struct AuthGate {
    api: ApiClient,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthGate {
    /// Create a gate that publishes on `sender`.
    #[must_use]
    pub fn new(api: ApiClient, sender: watch::Sender<AuthState>) -> Self {
        Self {
            api,
            state: Arc::new(sender),
        }
    }

    /// Latest state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receiver of every auth transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Sign in with email and password.
    ///
    /// The email is validated before anything is sent. A rejected or failed
    /// sign-in leaves the gate anonymous.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` on validation failure or if the backend rejects
    /// the credentials.
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: SecretString,
        remember_me: bool,
    ) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::MissingPassword);
        }

        self.state.send_replace(AuthState::Authenticating);

        let request = SignInRequest {
            email: email.clone(),
            password,
        };
        match self.api.sign_in(&request).await {
            Ok(response) => {
                let session = AuthSession::new(response.access_token, Some(email), remember_me);
                self.state
                    .send_replace(AuthState::Authenticated(session.clone()));
                tracing::info!("Signed in");
                Ok(session)
            }
            Err(err) => {
                self.state.send_replace(AuthState::Anonymous);
                tracing::warn!(error = %err, "Sign-in failed");
                Err(err.into())
            }
        }
    }

    /// Register a new account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` on validation failure or if the backend rejects
    /// the registration.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: SecretString,
    ) -> Result<(), AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(email)?;
        let length = password.expose_secret().chars().count();
        if length == 0 {
            return Err(AuthError::MissingPassword);
        }
        if length < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        self.api
            .sign_up(&SignUpRequest {
                name: name.to_string(),
                email,
                password,
            })
            .await?;
        Ok(())
    }

    /// Drop the session.
    pub fn sign_out(&self) {
        let previous = self.state.send_replace(AuthState::Anonymous);
        if previous.is_authenticated() {
            tracing::info!("Signed out");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn gate() -> AuthGate {
        let (tx, rx) = channel();
        // Nothing listens here; tests below never reach the network.
        let api = ApiClient::new(&ApiConfig::new("http://127.0.0.1:9").unwrap(), rx).unwrap();
        AuthGate::new(api, tx)
    }

    #[tokio::test]
    async fn test_sign_in_validates_email_before_network() {
        let gate = gate();
        let err = gate
            .sign_in("not-an-email", SecretString::from("pw"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
        assert!(!gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_validates_locally() {
        let gate = gate();
        assert!(matches!(
            gate.sign_up(" ", "a@b.co", SecretString::from("secret1")).await,
            Err(AuthError::MissingName)
        ));
        assert!(matches!(
            gate.sign_up("Jane", "a@b.co", SecretString::from("abc")).await,
            Err(AuthError::WeakPassword)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_publishes_anonymous() {
        let gate = gate();
        let mut rx = gate.subscribe();

        gate.state
            .send_replace(AuthState::Authenticated(AuthSession::new(SecretString::from("tok"), None, true)));
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.session().unwrap().token().expose_secret(), "tok");

        gate.sign_out();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = AuthSession::new(
            SecretString::from("super-secret-jwt"),
            Some(Email::parse("jane@example.com").unwrap()),
            false,
        );
        assert!(!format!("{session:?}").contains("super-secret-jwt"));
        assert_eq!(session.email().unwrap().as_str(), "jane@example.com");
    }
}
