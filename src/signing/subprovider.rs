//! Signing middleware stage.
//!
//! [`SignatureSubprovider`] intercepts the signing RPC methods, builds
//! a [`Transaction`], delegates to the [`TransactionSigner`], and feeds
//! the result back into the RPC stream. Everything else passes through
//! untouched.
//!
//! Per call: acquire an access token, optionally fetch the sender's
//! balance as advisory context, extract the method-specific payload,
//! sign, and for `eth_sendTransaction` broadcast the signed data as a
//! synthetic `eth_sendRawTransaction` through the chain. Any failure
//! ends the RPC call with that error; a transaction is never partially
//! completed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument, trace};

use super::signer::TransactionSigner;
use uuid::Uuid;

use super::transaction::{
    extract_payload, kind_for_method, Transaction, TransactionContext, TransactionKind,
    TransactionPayload, DEFAULT_SIGNATURE_METHODS,
};
use crate::auth::facade::AccessTokenProvider;
use crate::error::Result;
use crate::rpc::{JsonRpcRequest, ProviderEngine, Subprovider, SubproviderAction};

/// Middleware stage that turns signing RPC methods into signed output.
pub struct SignatureSubprovider {
    tokens: Arc<dyn AccessTokenProvider>,
    signer: Arc<dyn TransactionSigner>,
    methods: Vec<String>,
}

impl SignatureSubprovider {
    /// Build a stage intercepting the default signing methods.
    #[must_use]
    pub fn new(tokens: Arc<dyn AccessTokenProvider>, signer: Arc<dyn TransactionSigner>) -> Self {
        Self::with_methods(
            tokens,
            signer,
            DEFAULT_SIGNATURE_METHODS.iter().map(|m| m.to_string()).collect(),
        )
    }

    /// Build a stage intercepting a custom method list.
    ///
    /// Methods outside the four supported ones still fail closed at
    /// kind resolution; the list can only narrow the default set.
    #[must_use]
    pub fn with_methods(
        tokens: Arc<dyn AccessTokenProvider>,
        signer: Arc<dyn TransactionSigner>,
        methods: Vec<String>,
    ) -> Self {
        Self {
            tokens,
            signer,
            methods,
        }
    }

    /// Advisory balance lookup for the signer's approval step.
    ///
    /// Only performed for transactions headed to a network the hosted
    /// API does not manage; the managed service looks balances up
    /// itself. Never used for validation here.
    async fn current_balance(
        &self,
        engine: &ProviderEngine,
        kind: TransactionKind,
        from: Option<&str>,
    ) -> Result<Option<String>> {
        if kind != TransactionKind::SignTransaction || engine.network().is_managed() {
            return Ok(None);
        }
        let Some(from) = from else {
            return Ok(None);
        };

        trace!(from, "Fetching sender balance");
        let balance = engine
            .request("eth_getBalance", vec![json!(from), json!("latest")])
            .await?;
        Ok(balance.as_str().map(String::from))
    }

    #[instrument(skip(self, request, engine), fields(method = %request.method))]
    async fn process(&self, request: &JsonRpcRequest, engine: &ProviderEngine) -> Result<Value> {
        let access_token = self.tokens.get_access_token().await?;

        let kind = kind_for_method(&request.method)?;
        let payload = extract_payload(&request.method, &request.params)?;

        let from = match &payload {
            TransactionPayload::Message(message) => Some(message.from.clone()),
            TransactionPayload::Transaction(value) => value
                .get("from")
                .and_then(Value::as_str)
                .map(String::from),
        };

        let current_balance = self
            .current_balance(engine, kind, from.as_deref())
            .await?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            kind,
            payload,
            context: TransactionContext {
                chain_id: engine.network().chain_id,
                current_balance,
            },
        };

        debug!(id = %transaction.id, kind = ?kind, "Requesting signature");
        let signed_data = self.signer.sign(&transaction, &access_token).await?;

        if request.method == "eth_sendTransaction" {
            // Broadcast through the chain so the existing transport
            // stages carry the raw transaction; the visible result is
            // the broadcast result, not the signature.
            return engine
                .request("eth_sendRawTransaction", vec![json!(signed_data)])
                .await;
        }

        Ok(json!(signed_data))
    }
}

#[async_trait]
impl Subprovider for SignatureSubprovider {
    fn name(&self) -> &str {
        "signature"
    }

    async fn handle(
        &self,
        request: &JsonRpcRequest,
        engine: &ProviderEngine,
    ) -> Result<SubproviderAction> {
        if !self.methods.iter().any(|m| m == &request.method) {
            return Ok(SubproviderAction::Next);
        }
        Ok(SubproviderAction::End(self.process(request, engine).await?))
    }
}
