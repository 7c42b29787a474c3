//! Local callback server for the sign-in flow.
//!
//! The popup variant of sign-in opens the system browser at the
//! authorization endpoint and waits for the provider to redirect back to
//! a loopback URI. [`CallbackServer`] binds that URI, captures the query
//! parameters of the single redirect it receives, and hands them to the
//! waiting flow through a oneshot channel.
//!
//! User abandonment is detected by the wait timeout: if the browser
//! window is closed without completing, no callback ever arrives and the
//! wait resolves to [`AuthError::Cancelled`] instead of pending forever.
//!
//! # Security
//!
//! - Binds only to `127.0.0.1`
//! - Shuts down after one callback (or cancellation)
//! - State validation happens in the session manager, which rejects any
//!   mismatch before touching the token endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, Error, Result};

/// Query parameters of an authorization callback.
///
/// Either `code`/`state` on success or `error`/`error_description` on
/// failure, exactly as the authorization server appended them to the
/// redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl AuthCallback {
    /// Parse a callback from a full redirect URL.
    ///
    /// Used by the redirect flow, where the application hands the SDK
    /// the URL it was redirected to.
    pub fn from_url(redirect_url: &str) -> Result<Self> {
        let url = url::Url::parse(redirect_url)?;
        let mut callback = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => callback.code = Some(value.into_owned()),
                "state" => callback.state = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                "error_description" => callback.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(callback)
    }

    /// The normalized server error message, if the callback carries one.
    ///
    /// `error_description` when present, otherwise the `error` value.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|error| self.error_description.clone().unwrap_or_else(|| error.clone()))
    }
}

/// Shared state for the callback handler.
struct ServerState {
    /// Channel to send the callback to the waiting flow. Taken on first
    /// use so the flow completes at most once.
    result_tx: Mutex<Option<oneshot::Sender<AuthCallback>>>,
}

/// Local HTTP server receiving the authorization redirect.
pub struct CallbackServer {
    port: u16,
    path: String,
}

impl CallbackServer {
    /// Create a server for the given loopback port and callback path.
    #[must_use]
    pub fn new(port: u16, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
        }
    }

    /// The redirect URI this server answers.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, self.path)
    }

    /// Bind the server and return a handle to await the callback.
    ///
    /// The server runs until it has delivered one callback, the handle
    /// is cancelled, or the handle is dropped.
    pub async fn start(self) -> Result<CallbackHandle> {
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ServerState {
            result_tx: Mutex::new(Some(result_tx)),
        });

        let app = Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(state);

        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        info!(port = self.port, "Starting sign-in callback server");

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            Error::Config(format!(
                "Failed to start callback server on port {}: {e}",
                self.port
            ))
        })?;

        // When asked for port 0 the OS picks one; the handle reports
        // what was actually bound.
        let port = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(self.port);
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                    debug!(port, "Callback server shutdown requested");
                })
                .await
                .map_err(|e| error!(error = %e, "Callback server error"))
        });

        Ok(CallbackHandle {
            result_rx: Some(result_rx),
            shutdown_tx: Some(shutdown_tx),
            port,
        })
    }
}

/// Handle for an active callback server.
pub struct CallbackHandle {
    result_rx: Option<oneshot::Receiver<AuthCallback>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl CallbackHandle {
    /// Wait for the callback with a timeout.
    ///
    /// A timeout means the user never completed the flow and maps to
    /// [`AuthError::Cancelled`].
    pub async fn wait(mut self, timeout: Duration) -> Result<AuthCallback> {
        let result_rx = self
            .result_rx
            .take()
            .ok_or_else(|| Error::Config("Callback handle already consumed".into()))?;

        tokio::select! {
            result = result_rx => {
                result.map_err(|_| {
                    Error::Config("Callback channel closed unexpectedly".into())
                })
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_secs = timeout.as_secs(), "Sign-in callback timed out");
                Err(Error::Auth(AuthError::Cancelled))
            }
        }
    }

    /// The port this server is listening on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Cancel the server without waiting for a callback.
    pub fn cancel(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        info!(port = self.port, "Sign-in callback server cancelled");
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Deliver the callback parameters to the waiting flow and render a
/// minimal status page in the browser.
async fn handle_callback(
    State(state): State<Arc<ServerState>>,
    Query(callback): Query<AuthCallback>,
) -> Html<String> {
    debug!(
        has_code = callback.code.is_some(),
        has_error = callback.error.is_some(),
        "Received sign-in callback"
    );

    let page = if callback.error.is_some() {
        status_page(
            "Sign-in failed",
            "The authorization server reported an error. You can close this window.",
        )
    } else {
        status_page(
            "Sign-in complete",
            "You can close this window and return to the application.",
        )
    };

    if let Some(tx) = state.result_tx.lock().await.take() {
        let _ = tx.send(callback);
    }

    Html(page)
}

fn status_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{title}</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 4rem;">
<h1>{title}</h1>
<p>{body}</p>
</body>
</html>"#
    )
}
