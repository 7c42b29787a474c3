//! Network definitions for the provider engine.
//!
//! A [`Network`] pairs a JSON-RPC URL with its chain id. The SDK ships
//! the managed networks and accepts fully custom ones for development
//! against a local node.

use crate::config::DEFAULT_API_BASE_URL;
use crate::error::{Error, Result};

/// Host substring identifying the managed RPC nodes.
///
/// Requests to managed nodes skip the advisory balance lookup because the
/// signer backend can resolve balances itself.
pub const MANAGED_API_HOST: &str = "api.walletgate.dev";

/// An Ethereum network the provider can connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Display name of the network.
    pub name: String,
    /// JSON-RPC endpoint for the network.
    pub rpc_url: String,
    /// EIP-155 chain id, passed through to the remote signer.
    pub chain_id: u64,
}

impl Network {
    /// Create a custom network.
    #[must_use]
    pub fn new(name: impl Into<String>, rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            rpc_url: rpc_url.into(),
            chain_id,
        }
    }

    /// Ethereum mainnet via the managed nodes.
    #[must_use]
    pub fn mainnet() -> Self {
        Self::new("mainnet", format!("{DEFAULT_API_BASE_URL}/web3/mainnet"), 1)
    }

    /// Rinkeby testnet via the managed nodes.
    #[must_use]
    pub fn rinkeby() -> Self {
        Self::new("rinkeby", format!("{DEFAULT_API_BASE_URL}/web3/rinkeby"), 4)
    }

    /// Kovan testnet via the managed nodes.
    #[must_use]
    pub fn kovan() -> Self {
        Self::new("kovan", format!("{DEFAULT_API_BASE_URL}/web3/kovan"), 42)
    }

    /// Look up a network by name.
    ///
    /// The empty string is mainnet. Unknown names fail with a
    /// configuration error rather than defaulting.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "" | "mainnet" => Ok(Self::mainnet()),
            "rinkeby" => Ok(Self::rinkeby()),
            "kovan" => Ok(Self::kovan()),
            other => Err(Error::config(format!(
                "Unsupported network name {other}. Pass a custom Network instead."
            ))),
        }
    }

    /// Whether this network's RPC URL points at the managed API host.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.rpc_url.contains(MANAGED_API_HOST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_networks() {
        assert_eq!(Network::mainnet().chain_id, 1);
        assert_eq!(Network::rinkeby().chain_id, 4);
        assert_eq!(Network::kovan().chain_id, 42);
        assert!(Network::mainnet().is_managed());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Network::from_name("").unwrap().chain_id, 1);
        assert_eq!(Network::from_name("mainnet").unwrap().chain_id, 1);
        assert_eq!(Network::from_name("kovan").unwrap().chain_id, 42);
        assert!(Network::from_name("ropsten").is_err());
    }

    #[test]
    fn test_custom_network_not_managed() {
        let network = Network::new("local", "http://localhost:8545", 1337);
        assert!(!network.is_managed());
        assert_eq!(network.chain_id, 1337);
    }
}
