//! Session status facade.
//!
//! [`AuthStatusFacade`] is the application-facing surface over the
//! session manager: synchronous status queries, an idempotent
//! `connect`, sign-out with registered handlers, and the
//! [`AccessTokenProvider`] seam the signing pipeline consumes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::manager::OAuthSessionManager;
use crate::error::{AuthError, Error, Result};
use crate::storage::TokenStorage;
use crate::token::{AuthenticationStatus, TokenResponse, User};

/// Token for removing a registered sign-out handler.
///
/// Returned by [`AuthStatusFacade::add_sign_out_handler`]; each
/// registration gets a distinct id, so registering the same closure
/// twice yields two independently removable entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignOutHandlerId(u64);

type SignOutHandler = Box<dyn Fn() + Send + Sync>;

/// Application-facing session surface.
///
/// Wraps an [`OAuthSessionManager`] and exposes the status-oriented
/// operations callers poll from UI code. Status queries are synchronous
/// and never perform network I/O.
pub struct AuthStatusFacade<S: TokenStorage> {
    manager: Arc<OAuthSessionManager<S>>,
    /// User projection from the most recent sign-in or connect.
    cached_user: RwLock<Option<User>>,
    handlers: Mutex<Vec<(SignOutHandlerId, SignOutHandler)>>,
    next_handler_id: AtomicU64,
}

impl<S: TokenStorage> AuthStatusFacade<S> {
    /// Wrap a session manager.
    #[must_use]
    pub fn new(manager: Arc<OAuthSessionManager<S>>) -> Self {
        Self {
            manager,
            cached_user: RwLock::new(None),
            handlers: Mutex::new(Vec::new()),
            next_handler_id: AtomicU64::new(0),
        }
    }

    /// The wrapped session manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<OAuthSessionManager<S>> {
        &self.manager
    }

    /// Current authentication status, computed from the cached token
    /// without any network call.
    #[must_use]
    pub fn auth_status(&self) -> AuthenticationStatus {
        match self.manager.current_token() {
            Some(token) if !token.is_expired() => AuthenticationStatus::Connected,
            Some(token) if token.can_refresh() => AuthenticationStatus::Expired,
            Some(_) => AuthenticationStatus::NotConnected,
            None => AuthenticationStatus::NotConnected,
        }
    }

    /// Start the popup sign-in flow and cache the resulting user.
    pub async fn sign_in_popup(&self) -> Result<User> {
        let user = self.manager.sign_in_popup().await?;
        self.cache_user(&user);
        Ok(user)
    }

    /// Start the redirect sign-in flow, returning the authorization URL.
    pub fn sign_in_redirect(&self) -> Result<String> {
        self.manager.sign_in_redirect()
    }

    /// Complete a redirect sign-in and cache the resulting user.
    pub async fn redirect_callback(&self, redirect_url: &str) -> Result<User> {
        let user = self.manager.redirect_callback(redirect_url).await?;
        self.cache_user(&user);
        Ok(user)
    }

    /// Resume an existing session without user interaction.
    ///
    /// Idempotent: with a valid cached token this resolves immediately
    /// and performs no network call. An expired token with a refresh
    /// token is refreshed in place. Without a usable token this fails
    /// with [`AuthError::NotAuthenticated`] rather than opening a
    /// browser.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<User> {
        match self.manager.current_token() {
            Some(token) if !token.is_expired() => {
                if let Some(user) = self.cached_user.read().expect("user cache poisoned").clone() {
                    return Ok(user);
                }
                let user = User::from_token(&token, &serde_json::Value::Null);
                self.cache_user(&user);
                Ok(user)
            }
            Some(token) if token.can_refresh() => {
                let refresh_token = token
                    .refresh_token
                    .as_deref()
                    .ok_or(Error::Auth(AuthError::NotAuthenticated))?;
                debug!("Cached token expired; refreshing");
                let refreshed = self.manager.refresh_access_token(refresh_token).await?;
                let user = User::from_token(&refreshed, &serde_json::Value::Null);
                self.cache_user(&user);
                Ok(user)
            }
            _ => Err(Error::Auth(AuthError::NotAuthenticated)),
        }
    }

    /// The current user.
    ///
    /// Returns the cached projection when it carries claims; refreshes
    /// claims from the user-info endpoint when no projection is cached
    /// or the cached one was built without them (as [`connect`] does
    /// for a locally restored session).
    ///
    /// [`connect`]: Self::connect
    pub async fn get_user(&self) -> Result<User> {
        let token = self.current_valid_token().await?;

        let cached = self.cached_user.read().expect("user cache poisoned").clone();
        if let Some(user) = cached.filter(|user| !user.id.is_empty()) {
            return Ok(user);
        }

        let claims = self.manager.request_user_info(&token.access_token).await?;
        let user = User::from_token(&token, &claims);
        self.cache_user(&user);
        Ok(user)
    }

    /// End the session.
    ///
    /// Revokes the current access token when one exists, clears the
    /// cached token and stored copy, then notifies sign-out handlers in
    /// registration order. A panicking handler is isolated; the
    /// remaining handlers still run. Signing out while signed out is a
    /// no-op that still notifies handlers.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(token) = self.manager.current_token() {
            // Revocation treats an already-revoked token as success;
            // any other failure still aborts so the caller can retry.
            self.manager.request_sign_out(&token.access_token).await?;
        }

        self.manager.clear_token().await?;
        *self.cached_user.write().expect("user cache poisoned") = None;
        info!("Signed out");

        self.notify_sign_out_handlers();
        Ok(())
    }

    /// Register a sign-out handler.
    pub fn add_sign_out_handler(&self, handler: impl Fn() + Send + Sync + 'static) -> SignOutHandlerId {
        let id = SignOutHandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .expect("handler list poisoned")
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a previously registered sign-out handler.
    ///
    /// Unknown ids are ignored.
    pub fn remove_sign_out_handler(&self, id: SignOutHandlerId) {
        self.handlers
            .lock()
            .expect("handler list poisoned")
            .retain(|(handler_id, _)| *handler_id != id);
    }

    fn notify_sign_out_handlers(&self) {
        let handlers = self.handlers.lock().expect("handler list poisoned");
        for (id, handler) in handlers.iter() {
            if catch_unwind(AssertUnwindSafe(handler)).is_err() {
                warn!(handler = id.0, "Sign-out handler panicked");
            }
        }
    }

    fn cache_user(&self, user: &User) {
        *self.cached_user.write().expect("user cache poisoned") = Some(user.clone());
    }

    /// A token usable for API calls, refreshing the cached one when it
    /// has expired.
    async fn current_valid_token(&self) -> Result<TokenResponse> {
        // Re-read the cache after every await: a concurrent sign-out
        // or refresh may have replaced the token in the meantime.
        match self.manager.current_token() {
            Some(token) if !token.is_expired() => Ok(token),
            Some(token) if token.can_refresh() => {
                let refresh_token = token
                    .refresh_token
                    .as_deref()
                    .ok_or(Error::Auth(AuthError::NotAuthenticated))?
                    .to_string();
                self.manager.refresh_access_token(&refresh_token).await
            }
            _ => Err(Error::Auth(AuthError::NotAuthenticated)),
        }
    }
}

/// Source of access tokens for authenticated API calls.
///
/// The signing pipeline depends on this trait rather than on the
/// facade, so tests can supply a fixed token.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A currently valid access token.
    ///
    /// Implementations refresh expired tokens where possible and fail
    /// with [`AuthError::NotAuthenticated`] when no session exists.
    async fn get_access_token(&self) -> Result<String>;
}

#[async_trait]
impl<S: TokenStorage> AccessTokenProvider for AuthStatusFacade<S> {
    async fn get_access_token(&self) -> Result<String> {
        Ok(self.current_valid_token().await?.access_token)
    }
}

#[async_trait]
impl<T: AccessTokenProvider + ?Sized> AccessTokenProvider for Arc<T> {
    async fn get_access_token(&self) -> Result<String> {
        (**self).get_access_token().await
    }
}
