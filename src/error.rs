//! Unified error types for the WalletGate SDK.
//!
//! The error system uses two levels:
//!
//! 1. [`Error`] - Top-level errors covering all failure modes
//! 2. [`AuthError`] - OAuth-flow errors nested under `Error::Auth`
//!
//! Endpoint failures are never surfaced as raw transport exceptions: the
//! token and user-info clients normalize server error bodies into a single
//! human-readable message before constructing an [`AuthError::ServerError`].
//!
//! # Example
//!
//! ```rust
//! use walletgate::error::{Error, AuthError};
//!
//! fn handle_error(err: &Error) {
//!     if err.requires_reauth() {
//!         println!("User must sign in again");
//!     } else if err.is_recoverable() {
//!         println!("Transient error, safe to retry");
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the WalletGate SDK.
///
/// Covers both the authentication session manager and the transaction
/// signing pipeline. Each variant includes the context needed to decide
/// between retrying, re-authenticating, and failing the RPC call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// OAuth flow errors requiring user action.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Malformed or underspecified JSON-RPC payload reaching the signing
    /// pipeline.
    ///
    /// The pipeline never fabricates default values for missing fields.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A matched-but-unrecognized method reached transaction kind
    /// resolution.
    ///
    /// This indicates a programming error in the dispatch guard, not a
    /// user-facing condition.
    #[error("Method not supported: {0}")]
    MethodNotSupported(String),

    /// Opaque failure surfaced verbatim from the remote signer.
    #[error("Signer error: {0}")]
    Signer(String),

    /// Error response from a JSON-RPC node.
    #[error("RPC error ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node.
        message: String,
    },

    /// Network or HTTP transport error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration such as client IDs, endpoints,
    /// or network names.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an invalid-request error for the signing pipeline.
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a signer error.
    #[must_use]
    pub fn signer(msg: impl Into<String>) -> Self {
        Self::Signer(msg.into())
    }

    /// Check if this is any authentication-related error.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Check if this error requires the user to re-authenticate.
    ///
    /// Returns `true` when no valid session exists and it cannot be
    /// restored by a silent refresh.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::Auth(auth_err) => auth_err.requires_reauth(),
            _ => false,
        }
    }

    /// Check if this error is transient and safe to retry.
    ///
    /// The SDK performs no automatic retries; callers may retry the
    /// idempotent operations (token refresh, user-info) themselves.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// OAuth-flow errors.
///
/// These carry a normalized human-readable message and typically require
/// user action to resolve.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    /// No valid session exists and no interactive step was requested.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The `state` returned by the authorization callback does not match
    /// the pending request.
    ///
    /// Indicates a stale flow or a CSRF attempt; the callback is rejected
    /// and no token is stored.
    #[error("State mismatch")]
    StateMismatch,

    /// The callback arrived without a pending authorization request.
    #[error("No pending authorization request")]
    NoPendingRequest,

    /// The authorization server reported an error on the callback, or an
    /// endpoint returned an error body.
    ///
    /// The message is the normalized server message: `error_description`
    /// when present, otherwise the `error` value itself.
    #[error("{0}")]
    ServerError(String),

    /// The refresh token is invalid, revoked, or expired.
    #[error("Invalid grant")]
    InvalidGrant,

    /// The user abandoned the sign-in (closed the browser window) or the
    /// callback wait timed out.
    #[error("Cancelled")]
    Cancelled,
}

impl AuthError {
    /// Check if this error requires the user to re-authenticate.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::InvalidGrant | Self::StateMismatch
        )
    }

    /// Create a server error with a normalized message.
    #[must_use]
    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::ServerError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("missing client_id");
        assert_eq!(err.to_string(), "Configuration error: missing client_id");

        let err = Error::invalid_request("could not find transaction values");
        assert!(err.to_string().contains("transaction values"));
    }

    #[test]
    fn test_server_error_message_is_verbatim() {
        // The normalized message must surface unchanged as `.to_string()`
        // of the AuthError, matching what callers display to users.
        let err = AuthError::server_error("Oops!");
        assert_eq!(err.to_string(), "Oops!");
    }

    #[test]
    fn test_requires_reauth() {
        assert!(Error::Auth(AuthError::NotAuthenticated).requires_reauth());
        assert!(Error::Auth(AuthError::InvalidGrant).requires_reauth());
        assert!(Error::Auth(AuthError::StateMismatch).requires_reauth());
        assert!(!Error::Auth(AuthError::Cancelled).requires_reauth());
        assert!(!Error::config("x").requires_reauth());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(Error::Auth(AuthError::StateMismatch).is_auth_error());
        assert!(!Error::signer("boom").is_auth_error());
    }

    #[test]
    fn test_rpc_error_display() {
        let err = Error::Rpc {
            code: -32601,
            message: "method not found".into(),
        };
        assert!(err.to_string().contains("-32601"));
        assert!(err.to_string().contains("method not found"));
    }
}
