//! Token and user types.
//!
//! [`TokenResponse`] is the immutable result of a token-endpoint grant,
//! with the relative `expires_in` converted to an absolute timestamp at
//! construction. It is owned exclusively by the session manager; the
//! signing pipeline only ever sees the access token string.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Wire shape of a successful token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponseBody {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Token lifetime in seconds, relative to when the response was
    /// received.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A completed token grant.
///
/// Immutable once constructed. `expires_at` is derived from the wire
/// `expires_in` at construction time so later expiry checks need no
/// bookkeeping of when the grant happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer credential for API calls and the remote signer.
    pub access_token: String,
    /// Token type reported by the server (normally `bearer`).
    pub token_type: String,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
    /// Long-lived credential for silent refresh, when granted.
    pub refresh_token: Option<String>,
    /// OIDC identity token, when the `openid` scope was granted.
    pub id_token: Option<String>,
    /// Scopes actually granted.
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Construct from a wire response, anchoring expiry to now.
    ///
    /// A response without `expires_in` is treated as expiring in one
    /// hour, matching how the hosted service issues tokens.
    #[must_use]
    pub fn from_body(body: TokenResponseBody) -> Self {
        let expires_in = body.expires_in.unwrap_or(3600);
        Self {
            access_token: body.access_token,
            token_type: body.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            refresh_token: body.refresh_token,
            id_token: body.id_token,
            scope: body.scope,
        }
    }

    /// Whether the access token is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether a silent refresh is possible once this token expires.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Authentication status derived from the cached token.
///
/// - `Connected` - a token exists and is unexpired
/// - `Expired` - the token is past expiry but a refresh token exists
/// - `NotConnected` - no token, or expiry with no way to refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationStatus {
    Connected,
    Expired,
    NotConnected,
}

/// Application-facing view of the signed-in user.
///
/// A read-only projection of a [`TokenResponse`] plus the parsed
/// user-info claims; never mutated independently of its source token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Subject identifier from the user-info claims.
    pub id: String,
    /// Access token for API calls made on behalf of the user.
    pub access_token: String,
    /// OIDC identity token, when present.
    pub id_token: Option<String>,
    /// Granted scopes.
    pub scope: Option<String>,
}

impl User {
    /// Project a user from a token and its user-info claims.
    ///
    /// The subject is read from the standard `sub` claim; a claims object
    /// without one produces an empty id rather than failing, matching the
    /// permissive handling of non-OIDC servers.
    #[must_use]
    pub fn from_token(token: &TokenResponse, claims: &serde_json::Value) -> Self {
        let id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            id,
            access_token: token.access_token.clone(),
            id_token: token.id_token.clone(),
            scope: token.scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(expires_in: Option<i64>) -> TokenResponseBody {
        TokenResponseBody {
            access_token: "tok".into(),
            token_type: None,
            expires_in,
            refresh_token: Some("refresh".into()),
            id_token: None,
            scope: Some("openid offline".into()),
        }
    }

    #[test]
    fn test_expiry_is_absolute() {
        let token = TokenResponse::from_body(body(Some(600)));
        assert!(!token.is_expired());
        assert!(token.expires_at > Utc::now() + Duration::seconds(590));
        assert!(token.expires_at <= Utc::now() + Duration::seconds(600));
    }

    #[test]
    fn test_already_expired() {
        let token = TokenResponse::from_body(body(Some(-1)));
        assert!(token.is_expired());
        assert!(token.can_refresh());
    }

    #[test]
    fn test_missing_expires_in_defaults() {
        let token = TokenResponse::from_body(body(None));
        assert!(!token.is_expired());
        assert_eq!(token.token_type, "bearer");
    }

    #[test]
    fn test_user_projection() {
        let token = TokenResponse::from_body(body(Some(3600)));
        let claims = serde_json::json!({ "sub": "user-123", "email": "a@b.c" });
        let user = User::from_token(&token, &claims);

        assert_eq!(user.id, "user-123");
        assert_eq!(user.access_token, "tok");
        assert_eq!(user.scope.as_deref(), Some("openid offline"));
    }

    #[test]
    fn test_user_projection_without_sub() {
        let token = TokenResponse::from_body(body(Some(3600)));
        let user = User::from_token(&token, &serde_json::json!({}));
        assert!(user.id.is_empty());
    }
}
