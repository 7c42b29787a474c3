//! Pending authorization request state.
//!
//! A [`PendingAuthRequest`] holds everything bound to one in-flight
//! authorization round-trip: the PKCE pair, the `state` parameter for
//! CSRF protection, the OIDC nonce, and the redirect/scope parameters
//! the request was built with. Exactly one request is active per session
//! manager; starting a new sign-in replaces it, and consuming a callback
//! takes it regardless of outcome so a code can never be replayed
//! against a stale request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

use super::pkce::Pkce;

/// State for one in-flight authorization round-trip.
///
/// # Security
///
/// - `code_verifier` is secret and must never be logged
/// - `state` must be validated on every callback; a mismatch is rejected,
///   never silently accepted
#[derive(Debug, Clone)]
pub struct PendingAuthRequest {
    /// Random `state` parameter identifying this request.
    pub state: String,

    /// PKCE code verifier (secret, used during token exchange).
    pub code_verifier: String,

    /// PKCE code challenge (sent in the authorization URL).
    pub code_challenge: String,

    /// Redirect URI the request was built with.
    pub redirect_uri: String,

    /// Scopes requested, in order.
    pub scopes: Vec<String>,

    /// OIDC nonce bound to the eventual id token.
    pub nonce: String,
}

impl PendingAuthRequest {
    /// Create a fresh request with generated PKCE, state, and nonce.
    #[must_use]
    pub fn new(redirect_uri: impl Into<String>, scopes: Vec<String>) -> Self {
        let pkce = Pkce::generate();
        Self {
            state: generate_state(),
            code_verifier: pkce.verifier,
            code_challenge: pkce.challenge,
            redirect_uri: redirect_uri.into(),
            scopes,
            nonce: generate_state(),
        }
    }

    /// Validate that a received `state` matches this request.
    #[must_use]
    pub fn validate_state(&self, received_state: &str) -> bool {
        self.state == received_state
    }
}

/// Generate a random value for the `state` and `nonce` parameters.
///
/// 16 random bytes encoded as base64url, 22 characters.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
