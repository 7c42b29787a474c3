//! JSON-RPC middleware engine.
//!
//! A [`ProviderEngine`] runs each request through an ordered chain of
//! [`Subprovider`]s. Every subprovider either passes the request along
//! or ends it with a result; a request no subprovider claims falls
//! through to the terminal HTTP stage, which forwards it to the
//! engine's network endpoint.
//!
//! The pass/end choice is the return value itself
//! ([`SubproviderAction`]), so a handler cannot accidentally do both or
//! neither, and returning `Err` always ends the request with that
//! error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use super::types::{JsonRpcRequest, JsonRpcResponse};
use crate::config::DEFAULT_HTTP_TIMEOUT;
use crate::error::{Error, Result};
use crate::network::Network;

/// What a subprovider decided to do with a request.
#[derive(Debug)]
pub enum SubproviderAction {
    /// Not handled; hand the request to the next stage.
    Next,
    /// Handled; end the request with this result.
    End(Value),
}

/// One stage of the middleware chain.
#[async_trait]
pub trait Subprovider: Send + Sync {
    /// Stage name, used in logs.
    fn name(&self) -> &str;

    /// Inspect a request and decide whether to handle it.
    ///
    /// The `engine` reference lets a stage issue its own sub-requests
    /// (which run through the full chain again).
    async fn handle(
        &self,
        request: &JsonRpcRequest,
        engine: &ProviderEngine,
    ) -> Result<SubproviderAction>;
}

/// Ordered middleware chain plus the terminal HTTP forwarding stage.
///
/// Engines are inert until [`start`](ProviderEngine::start)ed and stop
/// accepting requests after [`stop`](ProviderEngine::stop); both are
/// idempotent. Construction is cheap, so the SDK can build one engine
/// per network lazily.
pub struct ProviderEngine {
    network: Network,
    subproviders: Vec<Arc<dyn Subprovider>>,
    http: reqwest::Client,
    headers: HashMap<String, String>,
    running: AtomicBool,
    next_id: AtomicU64,
}

impl ProviderEngine {
    /// Start building an engine for a network.
    #[must_use]
    pub fn builder(network: Network) -> ProviderEngineBuilder {
        ProviderEngineBuilder {
            network,
            subproviders: Vec::new(),
            headers: HashMap::new(),
            http: None,
        }
    }

    /// The network this engine forwards to.
    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Begin accepting requests.
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            debug!(network = %self.network.name, "Provider engine started");
        }
    }

    /// Stop accepting requests.
    ///
    /// In-flight requests run to completion; new ones are rejected.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!(network = %self.network.name, "Provider engine stopped");
        }
    }

    /// Whether the engine is currently accepting requests.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Build and send a request with a fresh id.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(JsonRpcRequest::new(id, method, params)).await
    }

    /// Run a request through the chain.
    ///
    /// Stages run in registration order. The first stage to end the
    /// request wins; an unclaimed request is forwarded to the network
    /// endpoint.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn send(&self, request: JsonRpcRequest) -> Result<Value> {
        if !self.is_running() {
            return Err(Error::invalid_request("provider engine is not started"));
        }

        for subprovider in &self.subproviders {
            match subprovider.handle(&request, self).await? {
                SubproviderAction::Next => {
                    trace!(stage = subprovider.name(), "Passed to next stage");
                }
                SubproviderAction::End(result) => {
                    trace!(stage = subprovider.name(), "Request ended by stage");
                    return Ok(result);
                }
            }
        }

        self.forward(&request).await
    }

    /// Terminal stage: POST the request to the network's RPC endpoint.
    async fn forward(&self, request: &JsonRpcRequest) -> Result<Value> {
        trace!(url = %self.network.rpc_url, "Forwarding to network");
        let mut http_request = self.http.post(&self.network.rpc_url).json(request);
        for (name, value) in &self.headers {
            http_request = http_request.header(name, value);
        }

        let response: JsonRpcResponse = http_request.send().await?.json().await?;
        response.into_result()
    }
}

/// Builder for [`ProviderEngine`].
pub struct ProviderEngineBuilder {
    network: Network,
    subproviders: Vec<Arc<dyn Subprovider>>,
    headers: HashMap<String, String>,
    http: Option<reqwest::Client>,
}

impl ProviderEngineBuilder {
    /// Append a stage to the chain.
    #[must_use]
    pub fn subprovider(mut self, subprovider: Arc<dyn Subprovider>) -> Self {
        self.subproviders.push(subprovider);
        self
    }

    /// Add a header sent with every forwarded request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a set of headers sent with every forwarded request.
    #[must_use]
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Use a preconfigured HTTP client instead of the default.
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Finish the engine. It starts stopped.
    #[must_use]
    pub fn build(self) -> ProviderEngine {
        let http = self.http.unwrap_or_else(|| {
            reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default()
        });
        ProviderEngine {
            network: self.network,
            subproviders: self.subproviders,
            http,
            headers: self.headers,
            running: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Ends a fixed method with a fixed result, passes everything else.
    struct FixedStage {
        method: &'static str,
        result: Value,
    }

    #[async_trait]
    impl Subprovider for FixedStage {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn handle(
            &self,
            request: &JsonRpcRequest,
            _engine: &ProviderEngine,
        ) -> Result<SubproviderAction> {
            if request.method == self.method {
                Ok(SubproviderAction::End(self.result.clone()))
            } else {
                Ok(SubproviderAction::Next)
            }
        }
    }

    struct FailingStage;

    #[async_trait]
    impl Subprovider for FailingStage {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(
            &self,
            _request: &JsonRpcRequest,
            _engine: &ProviderEngine,
        ) -> Result<SubproviderAction> {
            Err(Error::signer("stage failure"))
        }
    }

    fn engine_with(stages: Vec<Arc<dyn Subprovider>>) -> ProviderEngine {
        let mut builder = ProviderEngine::builder(Network::mainnet());
        for stage in stages {
            builder = builder.subprovider(stage);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_rejects_requests_before_start() {
        let engine = engine_with(vec![]);
        let result = engine.request("net_version", vec![]).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_first_matching_stage_wins() {
        let engine = engine_with(vec![
            Arc::new(FixedStage {
                method: "net_version",
                result: json!("1"),
            }),
            Arc::new(FixedStage {
                method: "net_version",
                result: json!("2"),
            }),
        ]);
        engine.start();

        let result = engine.request("net_version", vec![]).await.unwrap();
        assert_eq!(result, json!("1"));
    }

    #[tokio::test]
    async fn test_stage_error_ends_request() {
        let engine = engine_with(vec![
            Arc::new(FailingStage),
            Arc::new(FixedStage {
                method: "net_version",
                result: json!("1"),
            }),
        ]);
        engine.start();

        let result = engine.request("net_version", vec![]).await;
        assert!(matches!(result, Err(Error::Signer(_))));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let engine = engine_with(vec![]);
        engine.start();
        engine.start();
        assert!(engine.is_running());
        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
    }
}
