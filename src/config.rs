//! OAuth and provider configuration.
//!
//! [`AuthConfig`] holds everything needed to drive the authorization-code
//! flow against a WalletGate-compatible OAuth server. [`ProviderOptions`]
//! enumerates every recognized provider option with its default; options
//! are merged field by field, never as an untyped bag.
//!
//! # Example
//!
//! ```rust
//! use walletgate::config::AuthConfig;
//!
//! let config = AuthConfig::builder()
//!     .client_id("my-client-id")
//!     .redirect_uri("http://localhost:3000/callback")
//!     .build();
//!
//! assert!(config.authorization_endpoint.contains("/oauth2/auth"));
//! ```

use std::collections::HashMap;
use std::time::Duration;

use crate::network::Network;

/// Default OAuth scopes requested when none are configured.
///
/// `offline` requests a refresh token so sessions survive access token
/// expiry without re-prompting the user.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "offline"];

/// Default timeout applied to every HTTP request made by the SDK.
///
/// The OAuth flow itself has no protocol-level timeout; this bounds the
/// individual endpoint calls so a dead server cannot leave a caller
/// pending forever.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for the sign-in callback before treating the
/// flow as abandoned.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Base URL of the managed account service (OAuth endpoints).
pub const DEFAULT_ACCOUNT_BASE_URL: &str = "https://account.walletgate.dev";

/// Base URL of the managed API (signing endpoint, managed RPC nodes).
pub const DEFAULT_API_BASE_URL: &str = "https://api.walletgate.dev";

/// OAuth 2.0 configuration for the session manager.
///
/// Contains the client identity, endpoint URLs, and requested scopes.
/// Defaults target the managed service; every field can be overridden
/// through the builder for self-hosted or test deployments.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID issued for the application.
    pub client_id: String,

    /// Authorization endpoint (browser navigation target).
    pub authorization_endpoint: String,

    /// Token endpoint (code exchange and refresh grants, form-encoded).
    pub token_endpoint: String,

    /// User-info endpoint (bearer authenticated GET).
    pub user_info_endpoint: String,

    /// Token revocation endpoint.
    pub revocation_endpoint: String,

    /// Redirect URI registered for the client.
    ///
    /// For the popup (local callback) flow this must be a loopback URI
    /// whose port the callback server can bind.
    pub redirect_uri: String,

    /// OAuth scopes to request, in order.
    pub scopes: Vec<String>,

    /// Timeout for individual HTTP requests.
    pub http_timeout: Duration,

    /// How long the popup flow waits for the callback before failing
    /// with a cancellation error.
    pub callback_timeout: Duration,
}

impl AuthConfig {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Create a configuration for the managed service with defaults.
    ///
    /// # Arguments
    ///
    /// * `client_id` - OAuth client ID issued for the application
    /// * `redirect_uri` - Registered redirect URI
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self::builder()
            .client_id(client_id)
            .redirect_uri(redirect_uri)
            .build()
    }

    /// The port of the redirect URI, if it names one.
    ///
    /// Used by the popup flow to bind the local callback server.
    #[must_use]
    pub fn redirect_port(&self) -> Option<u16> {
        self.redirect_uri
            .parse::<url::Url>()
            .ok()
            .and_then(|u| u.port())
    }

    /// The path component of the redirect URI.
    #[must_use]
    pub fn redirect_path(&self) -> String {
        self.redirect_uri
            .parse::<url::Url>()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/callback".to_string())
    }
}

/// Builder for [`AuthConfig`].
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    client_id: Option<String>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    user_info_endpoint: Option<String>,
    revocation_endpoint: Option<String>,
    redirect_uri: Option<String>,
    scopes: Vec<String>,
    http_timeout: Option<Duration>,
    callback_timeout: Option<Duration>,
}

impl AuthConfigBuilder {
    /// Set the OAuth client ID.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the authorization endpoint.
    #[must_use]
    pub fn authorization_endpoint(mut self, url: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(url.into());
        self
    }

    /// Set the token endpoint.
    #[must_use]
    pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = Some(url.into());
        self
    }

    /// Set the user-info endpoint.
    #[must_use]
    pub fn user_info_endpoint(mut self, url: impl Into<String>) -> Self {
        self.user_info_endpoint = Some(url.into());
        self
    }

    /// Set the revocation endpoint.
    #[must_use]
    pub fn revocation_endpoint(mut self, url: impl Into<String>) -> Self {
        self.revocation_endpoint = Some(url.into());
        self
    }

    /// Set the redirect URI.
    #[must_use]
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Set the OAuth scopes, replacing the defaults.
    #[must_use]
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Add a single scope on top of the defaults.
    ///
    /// Seeds the list with [`DEFAULT_SCOPES`] on first use. Call
    /// [`scopes`](Self::scopes) first to start from a different base.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        if self.scopes.is_empty() {
            self.scopes = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
        }
        self.scopes.push(scope.into());
        self
    }

    /// Set the HTTP request timeout.
    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Set the callback wait timeout for the popup flow.
    #[must_use]
    pub fn callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = Some(timeout);
        self
    }

    /// Build the [`AuthConfig`].
    ///
    /// Endpoints not set explicitly default to the managed service.
    ///
    /// # Panics
    ///
    /// Panics if `client_id` or `redirect_uri` are missing.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        let scopes = if self.scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            self.scopes
        };

        AuthConfig {
            client_id: self.client_id.expect("client_id is required"),
            authorization_endpoint: self
                .authorization_endpoint
                .unwrap_or_else(|| format!("{DEFAULT_ACCOUNT_BASE_URL}/oauth2/auth")),
            token_endpoint: self
                .token_endpoint
                .unwrap_or_else(|| format!("{DEFAULT_ACCOUNT_BASE_URL}/oauth2/token")),
            user_info_endpoint: self
                .user_info_endpoint
                .unwrap_or_else(|| format!("{DEFAULT_ACCOUNT_BASE_URL}/userinfo")),
            revocation_endpoint: self
                .revocation_endpoint
                .unwrap_or_else(|| format!("{DEFAULT_ACCOUNT_BASE_URL}/oauth2/revoke")),
            redirect_uri: self.redirect_uri.expect("redirect_uri is required"),
            scopes,
            http_timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            callback_timeout: self.callback_timeout.unwrap_or(DEFAULT_CALLBACK_TIMEOUT),
        }
    }
}

/// Options for creating a provider engine.
///
/// Every recognized option is an explicit field with a default; there is
/// no open-ended bag. Unset fields fall back to the documented default
/// when the engine is created.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// The network to connect to. Defaults to mainnet.
    pub network: Option<Network>,

    /// Network name shorthand, used when `network` is not set.
    ///
    /// Recognized names: `mainnet` (or empty), `rinkeby`, `kovan`.
    /// Unknown names are a configuration error, never a silent default.
    pub network_name: Option<String>,

    /// Extra headers added to every request sent to the RPC node.
    pub additional_headers: HashMap<String, String>,

    /// RPC methods routed through the signing pipeline.
    ///
    /// Defaults to the four standard signing methods.
    pub signature_methods: Option<Vec<String>>,
}

impl ProviderOptions {
    /// Resolve the network from the options.
    ///
    /// Precedence: explicit `network`, then `network_name`, then mainnet.
    pub fn resolve_network(&self) -> crate::error::Result<Network> {
        if let Some(network) = &self.network {
            return Ok(network.clone());
        }
        if let Some(name) = &self.network_name {
            return Network::from_name(name);
        }
        Ok(Network::mainnet())
    }
}
