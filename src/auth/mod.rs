//! OAuth2/OIDC session handling.
//!
//! The authorization-code flow with PKCE, split into focused pieces:
//!
//! - [`pkce`] - verifier/challenge generation
//! - [`state`] - per-flow CSRF state and nonce
//! - [`endpoint`] - token, revocation, and user-info HTTP clients
//! - [`callback`] - redirect URL parsing and the local callback server
//! - [`manager`] - the flow orchestrator and token owner
//! - [`facade`] - application-facing status surface and token provider

pub mod callback;
pub mod endpoint;
pub mod facade;
pub mod manager;
pub mod pkce;
pub mod state;

pub use callback::{AuthCallback, CallbackHandle, CallbackServer};
pub use endpoint::TokenEndpointClient;
pub use facade::{AccessTokenProvider, AuthStatusFacade, SignOutHandlerId};
pub use manager::{OAuthSessionManager, SignInFlow, SignInMethod};
pub use pkce::Pkce;
pub use state::PendingAuthRequest;
