//! PKCE (Proof Key for Code Exchange) implementation.
//!
//! Provides code verifier generation and S256 challenge derivation for
//! the authorization code flow, per RFC 7636. PKCE protects against
//! authorization code interception: the client proves possession of the
//! verifier when exchanging the code for tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// PKCE verifier length in bytes.
///
/// 32 bytes produces a 43-character base64url string, within the
/// RFC 7636 requirement of 43-128 characters.
const PKCE_VERIFIER_LENGTH: usize = 32;

/// PKCE challenge method constant.
const PKCE_METHOD: &str = "S256";

/// A PKCE verifier/challenge pair.
#[derive(Debug, Clone)]
pub struct Pkce {
    /// The code verifier (secret, sent during token exchange).
    pub verifier: String,

    /// The code challenge (sent in the authorization URL).
    ///
    /// SHA-256 hash of the verifier, base64url encoded without padding.
    pub challenge: String,

    /// The challenge method (always "S256").
    pub method: &'static str,
}

impl Pkce {
    /// Generate a new verifier/challenge pair from 32 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; PKCE_VERIFIER_LENGTH] = rng.gen();

        let verifier = URL_SAFE_NO_PAD.encode(random_bytes);
        let challenge = Self::compute_challenge(&verifier);

        Self {
            verifier,
            challenge,
            method: PKCE_METHOD,
        }
    }

    /// Verify that a challenge matches a verifier.
    #[must_use]
    pub fn verify(verifier: &str, challenge: &str) -> bool {
        Self::compute_challenge(verifier) == challenge
    }

    fn compute_challenge(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_generation() {
        let pkce = Pkce::generate();
        assert!(!pkce.verifier.is_empty());
        assert!(!pkce.challenge.is_empty());
        assert_eq!(pkce.method, "S256");
        assert!(Pkce::verify(&pkce.verifier, &pkce.challenge));
    }

    #[test]
    fn test_verifier_length() {
        // 32 bytes base64url encoded = 43 characters
        assert_eq!(Pkce::generate().verifier.len(), 43);
    }

    #[test]
    fn test_url_safe() {
        let pkce = Pkce::generate();
        for value in [&pkce.verifier, &pkce.challenge] {
            assert!(
                value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                "contains non-URL-safe characters: {value}"
            );
        }
    }

    #[test]
    fn test_verification_failure() {
        let pkce = Pkce::generate();
        assert!(!Pkce::verify("wrong_verifier", &pkce.challenge));
        assert!(!Pkce::verify(&pkce.verifier, "wrong_challenge"));
    }

    #[test]
    fn test_unique_generation() {
        let pkce1 = Pkce::generate();
        let pkce2 = Pkce::generate();
        assert_ne!(pkce1.verifier, pkce2.verifier);
        assert_ne!(pkce1.challenge, pkce2.challenge);
    }
}
