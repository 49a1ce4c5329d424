//! Sign-in and sign-up endpoints.

use quickcommerce_core::Email;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::instrument;

use super::{ApiClient, ApiError};

/// Body of `POST /api/auth/signin`.
#[derive(Debug, Serialize)]
pub struct SignInRequest {
    pub email: Email,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

/// Body of `POST /api/auth/signup`.
#[derive(Debug, Serialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: Email,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

/// Response of `POST /api/auth/signin`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(deserialize_with = "secret")]
    pub access_token: SecretString,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl std::fmt::Debug for SignInResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl ApiClient {
    /// `POST /api/auth/signin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected, the request fails, or
    /// the response carries no access token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<SignInResponse, ApiError> {
        let url = self.endpoint("api/auth/signin")?;
        let response: SignInResponse = self
            .fetch(self.request(Method::POST, url).json(request))
            .await?;
        if response.access_token.expose_secret().trim().is_empty() {
            return Err(ApiError::MissingField("accessToken"));
        }
        Ok(response)
    }

    /// `POST /api/auth/signup`. Does not sign the new account in.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ApiError> {
        let url = self.endpoint("api/auth/signup")?;
        self.execute(self.request(Method::POST, url).json(request))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_request_serializes_password() {
        let request = SignInRequest {
            email: Email::parse("jane@example.com").unwrap(),
            password: SecretString::from("hunter2"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["email"], "jane@example.com");
        assert_eq!(json["password"], "hunter2");
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    #[test]
    fn test_sign_in_response_redacts_token() {
        let response: SignInResponse =
            serde_json::from_str(r#"{"accessToken":"jwt.abc.def"}"#).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.access_token.expose_secret(), "jwt.abc.def");
        assert!(!format!("{response:?}").contains("jwt.abc.def"));
    }
}
