//! Stateless HTTP client for the OAuth endpoints.
//!
//! [`TokenEndpointClient`] wraps the token, user-info, and revocation
//! endpoints. It owns no session state; the session manager layers the
//! pending-request and token-cache logic on top.
//!
//! # Error-shape normalization
//!
//! The hosted endpoints return errors in one of two shapes:
//!
//! ```json
//! { "error": { "message": "Oops!" } }
//! { "error": "Oops!" }
//! ```
//!
//! Both shapes normalize to the same human-readable message; a non-2xx
//! response with an unparseable body falls back to a generic transport
//! message. Callers never see raw transport exceptions from these
//! endpoints.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::{AuthError, Error, Result};
use crate::token::{TokenResponse, TokenResponseBody};

/// Stateless client for the token, user-info, and revocation endpoints.
#[derive(Clone)]
pub struct TokenEndpointClient {
    config: AuthConfig,
    http: reqwest::Client,
}

impl TokenEndpointClient {
    /// Create a client for the configured endpoints.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    /// Create a client with a pre-configured reqwest client.
    ///
    /// Useful for proxies or custom TLS settings.
    #[must_use]
    pub fn with_http_client(config: AuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        debug!("Exchanging authorization code for tokens");

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
            ("client_id", &self.config.client_id),
        ];

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await?;

        let body = Self::read_token_body(response).await?;
        Ok(TokenResponse::from_body(body))
    }

    /// Post a `refresh_token` grant and return the new token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
        ];

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await?;

        let body = Self::read_token_body(response).await?;
        Ok(TokenResponse::from_body(body))
    }

    /// Revoke an access token.
    ///
    /// Resolves with the raw server response (possibly empty) on any
    /// 2xx. Revoking an already-revoked token is a success per RFC 7009,
    /// so sign-out never fails on a dead token.
    pub async fn revoke(&self, access_token: &str) -> Result<Value> {
        debug!("Requesting token revocation");

        let params = [
            ("token", access_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.revocation_endpoint)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::normalize_error(status.as_u16(), &text));
        }

        // Revocation responses are frequently empty.
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    /// Fetch the user-info claims with a bearer token.
    pub async fn user_info(&self, access_token: &str) -> Result<Value> {
        debug!("Requesting user info");

        let response = self
            .http
            .get(&self.config.user_info_endpoint)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::normalize_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(Error::from)
    }

    /// Parse a token-endpoint response, normalizing error bodies.
    async fn read_token_body(response: reqwest::Response) -> Result<TokenResponseBody> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::normalize_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(Error::from)
    }

    /// Normalize a non-2xx endpoint response into an [`AuthError`].
    ///
    /// Handles both the `{error: {message}}` and `{error: "string"}`
    /// shapes; `invalid_grant` maps to its own variant so callers can
    /// tell a dead refresh token from other failures.
    fn normalize_error(status: u16, body: &str) -> Error {
        if let Some(message) = extract_error_message(body) {
            warn!(status, message = %message, "Endpoint returned an error");
            if message == "invalid_grant" {
                return Error::Auth(AuthError::InvalidGrant);
            }
            return Error::Auth(AuthError::ServerError(message));
        }

        warn!(status, "Endpoint returned an unparseable error body");
        Error::Auth(AuthError::ServerError(format!(
            "Request failed with status {status}"
        )))
    }
}

/// Extract a human-readable message from an endpoint error body.
///
/// Returns `None` when the body is not JSON or carries no `error` field.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_object_shape() {
        let body = r#"{ "error": { "message": "Oops!" } }"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("Oops!"));
    }

    #[test]
    fn test_extract_error_message_string_shape() {
        let body = r#"{ "error": "Oops!" }"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("Oops!"));
    }

    #[test]
    fn test_extract_error_message_unparseable() {
        assert_eq!(extract_error_message("<html>bad gateway</html>"), None);
        assert_eq!(extract_error_message(""), None);
        assert_eq!(extract_error_message(r#"{ "error": 42 }"#), None);
    }

    #[test]
    fn test_normalize_error_falls_back_to_status() {
        let err = TokenEndpointClient::normalize_error(502, "<html></html>");
        assert_eq!(
            err.to_string(),
            "Authentication error: Request failed with status 502"
        );
    }

    #[test]
    fn test_normalize_invalid_grant() {
        let err = TokenEndpointClient::normalize_error(400, r#"{"error":"invalid_grant"}"#);
        assert!(matches!(err, Error::Auth(AuthError::InvalidGrant)));
    }
}
