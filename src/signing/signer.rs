//! Remote signer seam.
//!
//! The pipeline depends only on the [`TransactionSigner`] trait;
//! [`HttpTransactionSigner`] is the production implementation that
//! posts the transaction to the hosted signing service. Key material
//! never exists on this side of the seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::transaction::Transaction;
use crate::auth::endpoint::extract_error_message;
use crate::error::{Error, Result};

/// Signs transactions on the user's behalf.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign a transaction, returning the signed data as a hex string.
    ///
    /// Signer-reported failures surface as [`Error::Signer`] with the
    /// service's message unmodified.
    async fn sign(&self, transaction: &Transaction, access_token: &str) -> Result<String>;
}

#[async_trait]
impl<T: TransactionSigner + ?Sized> TransactionSigner for Arc<T> {
    async fn sign(&self, transaction: &Transaction, access_token: &str) -> Result<String> {
        (**self).sign(transaction, access_token).await
    }
}

/// Remote signer backed by the hosted transaction API.
pub struct HttpTransactionSigner {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpTransactionSigner {
    /// Build a signer for the given API base URL.
    #[must_use]
    pub fn new(api_base_url: &str) -> Self {
        Self {
            endpoint: format!("{}/transactions", api_base_url.trim_end_matches('/')),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Pull the signed data out of the service response.
    ///
    /// The service wraps its result in a `transaction` envelope; the
    /// bare shape is accepted too.
    fn signed_data(body: &Value) -> Option<String> {
        let container = body.get("transaction").unwrap_or(body);
        container
            .get("signedData")
            .and_then(Value::as_str)
            .map(String::from)
    }
}

#[async_trait]
impl TransactionSigner for HttpTransactionSigner {
    #[instrument(skip(self, transaction, access_token), fields(id = %transaction.id))]
    async fn sign(&self, transaction: &Transaction, access_token: &str) -> Result<String> {
        debug!(kind = ?transaction.kind, "Submitting transaction for signing");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&json!({ "transaction": transaction }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = extract_error_message(&body)
                .unwrap_or_else(|| format!("Request failed with status {status}"));
            return Err(Error::Signer(message));
        }

        let body: Value = serde_json::from_str(&body)?;
        Self::signed_data(&body)
            .ok_or_else(|| Error::Signer("Signer response missing signed data".to_string()))
    }
}
