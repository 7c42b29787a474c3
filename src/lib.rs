//! # walletgate
//!
//! Client SDK for the WalletGate hosted wallet: OAuth2/OIDC sign-in
//! (authorization-code flow with PKCE) plus an Ethereum JSON-RPC
//! provider whose signing methods are fulfilled by a remote signer
//! service. Private keys never touch the client.
//!
//! ## Quick start
//!
//! ```no_run
//! use walletgate::{ProviderOptions, WalletGate};
//!
//! # async fn run() -> walletgate::Result<()> {
//! let sdk = WalletGate::new("my-client-id", "http://127.0.0.1:9916/callback");
//!
//! // Resume an existing session, or run the popup sign-in flow.
//! let user = sdk.start().await?;
//!
//! // A web3-style provider; signing methods go through the remote
//! // signer, everything else is forwarded to the network.
//! let provider = sdk.get_provider(ProviderOptions::default())?;
//! let balance = provider
//!     .request("eth_getBalance", vec!["0xabc".into(), "latest".into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`auth`] - the OAuth flow: PKCE, pending-request state, the token
//!   endpoint client, the local callback server, the session manager,
//!   and the status facade.
//! - [`rpc`] - the JSON-RPC middleware engine: an ordered chain of
//!   [`Subprovider`]s with a terminal HTTP forwarding stage.
//! - [`signing`] - the signing pipeline: transaction assembly, the
//!   remote signer seam, and the middleware stage that ties them in.
//! - [`sdk`] - the [`WalletGate`] facade over all of it.

pub mod auth;
pub mod config;
pub mod error;
pub mod network;
pub mod rpc;
pub mod sdk;
pub mod signing;
pub mod storage;
pub mod token;

pub use auth::{
    AccessTokenProvider, AuthStatusFacade, OAuthSessionManager, SignInFlow, SignInMethod,
    SignOutHandlerId,
};
pub use config::{AuthConfig, AuthConfigBuilder, ProviderOptions};
pub use error::{AuthError, Error, Result};
pub use network::Network;
pub use rpc::{JsonRpcRequest, JsonRpcResponse, ProviderEngine, Subprovider, SubproviderAction};
pub use sdk::{WalletGate, WalletGateBuilder};
pub use signing::{
    HttpTransactionSigner, SignatureSubprovider, Transaction, TransactionKind, TransactionSigner,
};
pub use storage::{MemoryTokenStorage, TokenStorage};
pub use token::{AuthenticationStatus, TokenResponse, User};
