//! OAuth session manager.
//!
//! [`OAuthSessionManager`] drives the authorization-code (PKCE) flow end
//! to end and owns the current token. Two sign-in strategies are
//! supported:
//!
//! - **Redirect**: [`sign_in_redirect`](OAuthSessionManager::sign_in_redirect)
//!   opens the authorization URL in the system browser and returns it;
//!   the application completes the flow later by handing the redirect
//!   URL to [`redirect_callback`](OAuthSessionManager::redirect_callback).
//! - **Popup**: [`sign_in_popup`](OAuthSessionManager::sign_in_popup)
//!   binds a local callback server on the redirect URI's port, opens the
//!   browser, and awaits the callback in place, failing with
//!   `Cancelled` when the user abandons the window.
//!
//! Both strategies share one completion path, so state validation and
//! error normalization behave identically.
//!
//! # Flow state machine
//!
//! ```text
//! Idle -> (sign_in_*) -> PendingRequest -> (callback, state matches)
//!      -> Exchanging -> Complete
//!                    -> Failed (mismatch / server error / cancelled)
//! ```
//!
//! `Idle` is reentrant after `Complete` or `Failed`; the pending request
//! is taken exactly once per callback, success or failure, so a stale
//! code can never be replayed.

use std::sync::RwLock;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::callback::{AuthCallback, CallbackServer};
use super::endpoint::TokenEndpointClient;
use super::state::PendingAuthRequest;
use crate::config::AuthConfig;
use crate::error::{AuthError, Error, Result};
use crate::storage::TokenStorage;
use crate::token::{TokenResponse, User};

/// Which sign-in strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignInMethod {
    /// Local callback server; completes in place.
    #[default]
    Popup,
    /// Browser navigation; the application completes the flow later via
    /// [`OAuthSessionManager::redirect_callback`].
    Redirect,
}

/// Outcome of [`OAuthSessionManager::sign_in`].
#[derive(Debug)]
pub enum SignInFlow {
    /// The popup flow finished and produced a user.
    Completed(User),
    /// The redirect flow started; the application must navigate to the
    /// contained authorization URL (already opened in the browser) and
    /// later hand the redirect URL back.
    AwaitingRedirect(String),
}

/// Orchestrates the OAuth2 authorization-code flow and owns the cached
/// token.
///
/// The cached [`TokenResponse`] is mutated only here (on exchange,
/// refresh, and sign-out) and read by the status facade and the signing
/// pipeline. Readers always take a fresh snapshot; no guard is held
/// across a suspension point.
pub struct OAuthSessionManager<S: TokenStorage> {
    config: AuthConfig,
    endpoint: TokenEndpointClient,
    storage: S,
    /// At most one in-flight authorization request.
    pending: RwLock<Option<PendingAuthRequest>>,
    /// The current token; readers clone a snapshot, never hold the guard.
    token_cache: RwLock<Option<TokenResponse>>,
}

impl<S: TokenStorage> OAuthSessionManager<S> {
    /// Create a manager with the given configuration and token storage.
    #[must_use]
    pub fn new(config: AuthConfig, storage: S) -> Self {
        let endpoint = TokenEndpointClient::new(config.clone());
        Self {
            config,
            endpoint,
            storage,
            pending: RwLock::new(None),
            token_cache: RwLock::new(None),
        }
    }

    /// Create a manager with a custom endpoint client.
    #[must_use]
    pub fn with_endpoint(config: AuthConfig, storage: S, endpoint: TokenEndpointClient) -> Self {
        Self {
            config,
            endpoint,
            storage,
            pending: RwLock::new(None),
            token_cache: RwLock::new(None),
        }
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The current cached token, if any.
    #[must_use]
    pub fn current_token(&self) -> Option<TokenResponse> {
        self.token_cache.read().expect("token cache poisoned").clone()
    }

    /// Hydrate the cache from storage.
    ///
    /// Call once after construction when the storage backend persists
    /// tokens across launches.
    pub async fn restore_session(&self) -> Result<Option<TokenResponse>> {
        let stored = self.storage.load().await?;
        if let Some(token) = &stored {
            debug!(backend = self.storage.name(), "Restored stored token");
            *self.token_cache.write().expect("token cache poisoned") = Some(token.clone());
        }
        Ok(stored)
    }

    /// Build the authorization URL for a pending request.
    ///
    /// Query parameters: `client_id`, `redirect_uri`, `response_type=code`,
    /// `scope`, `state`, `code_challenge`, `code_challenge_method=S256`,
    /// and the OIDC `nonce`.
    pub fn authorization_url(&self, request: &PendingAuthRequest) -> Result<String> {
        let mut url = url::Url::parse(&self.config.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &request.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &request.scopes.join(" "));
            query.append_pair("state", &request.state);
            query.append_pair("code_challenge", &request.code_challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("nonce", &request.nonce);
        }
        Ok(url.into())
    }

    /// Create a fresh pending request, replacing any previous one.
    ///
    /// A new sign-in always starts an independent request; an abandoned
    /// earlier flow can no longer complete.
    fn begin_authorization(&self) -> PendingAuthRequest {
        let request =
            PendingAuthRequest::new(self.config.redirect_uri.clone(), self.config.scopes.clone());
        debug!(state = %request.state, "Started authorization request");
        *self.pending.write().expect("pending lock poisoned") = Some(request.clone());
        request
    }

    /// Take the pending request, leaving the flow idle.
    fn take_pending(&self) -> Option<PendingAuthRequest> {
        self.pending.write().expect("pending lock poisoned").take()
    }

    /// Start the redirect sign-in flow.
    ///
    /// Creates a pending request, opens the authorization URL in the
    /// system browser, and returns the URL. The flow completes when the
    /// application passes the redirect URL to [`redirect_callback`].
    ///
    /// Caller contract: invoke in direct response to user interaction,
    /// so the browser treats the navigation as user-initiated.
    ///
    /// [`redirect_callback`]: OAuthSessionManager::redirect_callback
    #[instrument(skip(self))]
    pub fn sign_in_redirect(&self) -> Result<String> {
        let request = self.begin_authorization();
        let auth_url = self.authorization_url(&request)?;

        if let Err(e) = open::that(&auth_url) {
            warn!(error = %e, "Failed to open browser; caller must navigate manually");
        }

        Ok(auth_url)
    }

    /// Complete a redirect sign-in from the URL the user was redirected
    /// to.
    ///
    /// Fails with the normalized server message when the callback
    /// carries `error`, and with `StateMismatch` when `state` does not
    /// match the pending request. The pending request is consumed either
    /// way.
    #[instrument(skip(self, redirect_url))]
    pub async fn redirect_callback(&self, redirect_url: &str) -> Result<User> {
        let callback = AuthCallback::from_url(redirect_url)?;
        self.complete_callback(callback).await
    }

    /// Start the popup sign-in flow and wait for it to finish.
    ///
    /// Binds the local callback server to the redirect URI's port, opens
    /// the browser, and awaits the callback. Abandonment (the user
    /// closes the window) is detected by the callback timeout and maps
    /// to [`AuthError::Cancelled`].
    ///
    /// Caller contract: invoke in direct response to user interaction.
    #[instrument(skip(self))]
    pub async fn sign_in_popup(&self) -> Result<User> {
        let port = self.config.redirect_port().ok_or_else(|| {
            Error::config("popup sign-in requires a loopback redirect_uri with an explicit port")
        })?;

        // Bind before navigating so the redirect target exists by the
        // time the user finishes authorizing.
        let server = CallbackServer::new(port, self.config.redirect_path());
        let handle = server.start().await?;

        let request = self.begin_authorization();
        let auth_url = self.authorization_url(&request)?;

        if let Err(e) = open::that(&auth_url) {
            warn!(error = %e, "Failed to open browser; caller must navigate manually");
        }

        let callback = match handle.wait(self.config.callback_timeout).await {
            Ok(callback) => callback,
            Err(e) => {
                // The flow is over either way; drop the pending request
                // so a late callback cannot complete a dead flow.
                self.take_pending();
                return Err(e);
            }
        };

        self.complete_callback(callback).await
    }

    /// Run the chosen sign-in strategy.
    pub async fn sign_in(&self, method: SignInMethod) -> Result<SignInFlow> {
        match method {
            SignInMethod::Popup => Ok(SignInFlow::Completed(self.sign_in_popup().await?)),
            SignInMethod::Redirect => {
                Ok(SignInFlow::AwaitingRedirect(self.sign_in_redirect()?))
            }
        }
    }

    /// Shared completion path for both sign-in strategies.
    ///
    /// Consumes the pending request exactly once, validates `state`,
    /// exchanges the code, caches the token, and projects the [`User`].
    pub async fn complete_callback(&self, callback: AuthCallback) -> Result<User> {
        // Taken before any validation so the request cannot be reused
        // after a failure.
        let pending = self.take_pending();

        if let Some(message) = callback.error_message() {
            warn!(message = %message, "Authorization server returned an error");
            return Err(Error::Auth(AuthError::ServerError(message)));
        }

        let pending = pending.ok_or(Error::Auth(AuthError::NoPendingRequest))?;

        match callback.state.as_deref() {
            Some(state) if pending.validate_state(state) => {}
            received => {
                warn!(
                    expected = %pending.state,
                    received = ?received,
                    "Authorization state mismatch"
                );
                return Err(Error::Auth(AuthError::StateMismatch));
            }
        }

        let code = callback.code.as_deref().ok_or_else(|| {
            Error::Auth(AuthError::ServerError(
                "Authorization callback missing code".to_string(),
            ))
        })?;

        let token = self
            .endpoint
            .exchange_code(code, &pending.code_verifier, &pending.redirect_uri)
            .await?;

        self.store_token(&token).await?;
        info!("Sign-in completed");

        // The user projection prefers fresh claims but degrades to a
        // token-only view when the user-info endpoint is unavailable;
        // callers needing claims use `request_user_info` directly.
        let claims = match self.endpoint.user_info(&token.access_token).await {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "User-info fetch failed after sign-in");
                Value::Null
            }
        };

        Ok(User::from_token(&token, &claims))
    }

    /// Post a `refresh_token` grant and cache the new token.
    ///
    /// An `invalid_grant` response surfaces as
    /// [`AuthError::InvalidGrant`]; anything else carries the server's
    /// normalized message.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut token = self.endpoint.refresh(refresh_token).await?;

        // Servers may omit the refresh token on rotation; keep the old
        // one so the session stays refreshable.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        self.store_token(&token).await?;
        info!("Access token refreshed");
        Ok(token)
    }

    /// Revoke an access token.
    ///
    /// Resolves with the raw server response on any 2xx, including for
    /// a token that was already revoked. Does not touch the cache; the
    /// status facade clears it as part of sign-out.
    pub async fn request_sign_out(&self, access_token: &str) -> Result<Value> {
        self.endpoint.revoke(access_token).await
    }

    /// Fetch the user-info claims for an access token.
    pub async fn request_user_info(&self, access_token: &str) -> Result<Value> {
        self.endpoint.user_info(access_token).await
    }

    /// Cache a token and write it through to storage.
    pub(crate) async fn store_token(&self, token: &TokenResponse) -> Result<()> {
        *self.token_cache.write().expect("token cache poisoned") = Some(token.clone());
        self.storage.save(token).await
    }

    /// Clear the cached token and its stored copy.
    pub(crate) async fn clear_token(&self) -> Result<()> {
        *self.token_cache.write().expect("token cache poisoned") = None;
        self.storage.clear().await
    }

    /// Whether a sign-in flow is currently pending.
    #[must_use]
    pub fn has_pending_request(&self) -> bool {
        self.pending.read().expect("pending lock poisoned").is_some()
    }
}
