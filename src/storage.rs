//! Token persistence between sessions.
//!
//! The session manager owns the in-memory token cache; persistence across
//! application restarts is delegated to a [`TokenStorage`] collaborator.
//! The SDK ships [`MemoryTokenStorage`] for tests and short-lived
//! processes; applications provide their own backend (keyring, encrypted
//! file) by implementing the trait.
//!
//! # Security
//!
//! - Never log token values in implementations
//! - Use `#[instrument(skip(token))]` when tracing save operations

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::token::TokenResponse;

/// Trait for token storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`) to support
/// concurrent access from multiple tasks.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Load the stored token, if any.
    async fn load(&self) -> Result<Option<TokenResponse>>;

    /// Save a token, overwriting any existing one.
    async fn save(&self, token: &TokenResponse) -> Result<()>;

    /// Remove the stored token. A no-op when nothing is stored.
    async fn clear(&self) -> Result<()>;

    /// Name of this backend, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket implementation for `Arc<T>` where T: TokenStorage
#[async_trait]
impl<T: TokenStorage + ?Sized> TokenStorage for Arc<T> {
    async fn load(&self) -> Result<Option<TokenResponse>> {
        (**self).load().await
    }

    async fn save(&self, token: &TokenResponse) -> Result<()> {
        (**self).save(token).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// In-memory token storage.
///
/// Tokens are lost when the process exits. Suitable for tests and for
/// applications that intentionally re-authenticate on launch.
#[derive(Default)]
pub struct MemoryTokenStorage {
    token: RwLock<Option<TokenResponse>>,
}

impl MemoryTokenStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn load(&self) -> Result<Option<TokenResponse>> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &TokenResponse) -> Result<()> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.write().await = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
