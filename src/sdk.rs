//! SDK entry point.
//!
//! [`WalletGate`] ties the pieces together: the auth facade, the remote
//! signer, and an owned cache of provider engines keyed by RPC URL.
//! Engines are created lazily per network and stopped on sign-out.
//!
//! # Example
//!
//! ```no_run
//! use walletgate::{ProviderOptions, WalletGate};
//!
//! # async fn run() -> walletgate::Result<()> {
//! let sdk = WalletGate::new("my-client-id", "http://127.0.0.1:9916/callback");
//! let user = sdk.start().await?;
//! println!("signed in as {}", user.id);
//!
//! let provider = sdk.get_provider(ProviderOptions::default())?;
//! let accounts = provider.request("eth_accounts", vec![]).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument};

use crate::auth::facade::{AccessTokenProvider, AuthStatusFacade, SignOutHandlerId};
use crate::auth::manager::OAuthSessionManager;
use crate::config::{AuthConfig, ProviderOptions, DEFAULT_API_BASE_URL};
use crate::error::Result;
use crate::rpc::ProviderEngine;
use crate::signing::{HttpTransactionSigner, SignatureSubprovider, TransactionSigner};
use crate::storage::{MemoryTokenStorage, TokenStorage};
use crate::token::{AuthenticationStatus, User};

/// The SDK facade.
///
/// Owns one engine per RPC URL; repeated [`get_provider`] calls with
/// the same resolved network return the same engine.
///
/// [`get_provider`]: WalletGate::get_provider
pub struct WalletGate<S: TokenStorage + 'static = MemoryTokenStorage> {
    facade: Arc<AuthStatusFacade<S>>,
    signer: Arc<dyn TransactionSigner>,
    engines: Mutex<HashMap<String, Arc<ProviderEngine>>>,
}

impl WalletGate<MemoryTokenStorage> {
    /// Build an SDK instance with in-memory token storage and the
    /// hosted signer.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self::builder(AuthConfig::new(client_id, redirect_uri), MemoryTokenStorage::new()).build()
    }
}

impl<S: TokenStorage + 'static> WalletGate<S> {
    /// Start building an SDK instance.
    #[must_use]
    pub fn builder(config: AuthConfig, storage: S) -> WalletGateBuilder<S> {
        WalletGateBuilder {
            config,
            storage,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            signer: None,
        }
    }

    /// The auth surface.
    #[must_use]
    pub fn auth(&self) -> &Arc<AuthStatusFacade<S>> {
        &self.facade
    }

    /// A provider engine for the requested network.
    ///
    /// Engines are cached by RPC URL and started on first use. An
    /// unknown network name fails with `Error::Config`.
    #[instrument(skip(self, options))]
    pub fn get_provider(&self, options: ProviderOptions) -> Result<Arc<ProviderEngine>> {
        let network = options.resolve_network()?;

        let mut engines = self.engines.lock().expect("engine map poisoned");
        if let Some(engine) = engines.get(&network.rpc_url) {
            return Ok(Arc::clone(engine));
        }

        debug!(network = %network.name, url = %network.rpc_url, "Creating provider engine");
        let tokens: Arc<dyn AccessTokenProvider> = self.facade.clone();
        let signature_stage = match options.signature_methods {
            Some(methods) => {
                SignatureSubprovider::with_methods(tokens, Arc::clone(&self.signer), methods)
            }
            None => SignatureSubprovider::new(tokens, Arc::clone(&self.signer)),
        };

        let engine = Arc::new(
            ProviderEngine::builder(network.clone())
                .subprovider(Arc::new(signature_stage))
                .headers(options.additional_headers)
                .build(),
        );
        engine.start();
        engines.insert(network.rpc_url, Arc::clone(&engine));
        Ok(engine)
    }

    /// Sign in or resume: resolves the existing session when one is
    /// usable, otherwise runs the popup flow.
    pub async fn start(&self) -> Result<User> {
        match self.facade.connect().await {
            Ok(user) => Ok(user),
            Err(e) if e.requires_reauth() => {
                debug!("No resumable session; starting interactive sign-in");
                self.facade.sign_in_popup().await
            }
            Err(e) => Err(e),
        }
    }

    /// Interactive popup sign-in.
    pub async fn sign_in(&self) -> Result<User> {
        self.facade.sign_in_popup().await
    }

    /// Start the redirect sign-in flow, returning the authorization URL.
    pub fn sign_in_redirect(&self) -> Result<String> {
        self.facade.sign_in_redirect()
    }

    /// Complete a redirect sign-in.
    pub async fn redirect_callback(&self, redirect_url: &str) -> Result<User> {
        self.facade.redirect_callback(redirect_url).await
    }

    /// Resume the existing session without user interaction.
    pub async fn connect(&self) -> Result<User> {
        self.facade.connect().await
    }

    /// The current user.
    pub async fn get_user(&self) -> Result<User> {
        self.facade.get_user().await
    }

    /// Current authentication status.
    #[must_use]
    pub fn auth_status(&self) -> AuthenticationStatus {
        self.facade.auth_status()
    }

    /// Sign out: stop every engine, then end the session.
    ///
    /// Stopped engines reject further requests; `get_provider` after
    /// sign-out creates fresh ones.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let engines: Vec<_> = {
            let mut map = self.engines.lock().expect("engine map poisoned");
            map.drain().map(|(_, engine)| engine).collect()
        };
        for engine in engines {
            engine.stop();
        }
        info!("Stopped all provider engines");

        self.facade.sign_out().await
    }

    /// Register a sign-out handler.
    pub fn add_sign_out_handler(
        &self,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> SignOutHandlerId {
        self.facade.add_sign_out_handler(handler)
    }

    /// Remove a previously registered sign-out handler.
    pub fn remove_sign_out_handler(&self, id: SignOutHandlerId) {
        self.facade.remove_sign_out_handler(id)
    }
}

/// Builder for [`WalletGate`].
pub struct WalletGateBuilder<S: TokenStorage + 'static> {
    config: AuthConfig,
    storage: S,
    api_base_url: String,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl<S: TokenStorage + 'static> WalletGateBuilder<S> {
    /// Base URL of the hosted API (signer endpoint).
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Use a custom transaction signer instead of the hosted one.
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Finish the SDK instance.
    #[must_use]
    pub fn build(self) -> WalletGate<S> {
        let signer = self
            .signer
            .unwrap_or_else(|| Arc::new(HttpTransactionSigner::new(&self.api_base_url)));
        let manager = Arc::new(OAuthSessionManager::new(self.config, self.storage));
        WalletGate {
            facade: Arc::new(AuthStatusFacade::new(manager)),
            signer,
            engines: Mutex::new(HashMap::new()),
        }
    }
}
