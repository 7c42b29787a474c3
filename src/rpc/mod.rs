//! JSON-RPC provider plumbing.

pub mod engine;
pub mod types;

pub use engine::{ProviderEngine, ProviderEngineBuilder, Subprovider, SubproviderAction};
pub use types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
