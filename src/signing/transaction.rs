//! Signable transaction model.
//!
//! A [`Transaction`] is the unit handed to the remote signer: a fresh
//! id, the kind derived from the RPC method, the method-specific
//! payload, and advisory context (chain id, optional sender balance).
//! One is built per signing RPC call and consumed exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::rpc::JsonRpcRequest;

/// RPC methods the signing pipeline intercepts by default.
pub const DEFAULT_SIGNATURE_METHODS: [&str; 4] = [
    "eth_sendTransaction",
    "eth_signTransaction",
    "eth_sign",
    "personal_sign",
];

/// What kind of signature the remote signer is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Sign a full transaction object.
    #[serde(rename = "ETH_SIGN_TRANSACTION")]
    SignTransaction,
    /// Sign an arbitrary message for an address.
    #[serde(rename = "ETH_SIGN")]
    Sign,
}

/// Derive the kind from an RPC method name.
///
/// Total over the four supported methods; anything else fails closed.
/// An unsupported method reaching this point means the dispatch guard
/// let a request through it should not have.
pub fn kind_for_method(method: &str) -> Result<TransactionKind> {
    match method {
        "eth_sendTransaction" | "eth_signTransaction" => Ok(TransactionKind::SignTransaction),
        "eth_sign" | "personal_sign" => Ok(TransactionKind::Sign),
        other => Err(Error::MethodNotSupported(other.to_string())),
    }
}

/// Message-signature payload, normalized to `{from, message}` for both
/// `eth_sign` and `personal_sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePayload {
    pub from: String,
    pub message: String,
}

/// Payload of a [`Transaction`].
///
/// Transaction payloads are carried verbatim: the first RPC parameter
/// as received, with no field validation here (an upstream validator
/// stage owns that).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionPayload {
    Message(SignaturePayload),
    Transaction(Value),
}

/// Advisory context attached to a transaction for the signer's approval
/// step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionContext {
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<String>,
}

/// A signable unit for the remote signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub payload: TransactionPayload,
    pub context: TransactionContext,
}

impl Transaction {
    /// Build a transaction from a signing RPC request.
    ///
    /// Fails with `InvalidRequest` when the method's required parameters
    /// are missing or malformed; no defaults are fabricated.
    pub fn from_request(request: &JsonRpcRequest, context: TransactionContext) -> Result<Self> {
        let kind = kind_for_method(&request.method)?;
        let payload = extract_payload(&request.method, &request.params)?;
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            context,
        })
    }

    /// The sender address, when the payload carries one.
    #[must_use]
    pub fn from_address(&self) -> Option<&str> {
        match &self.payload {
            TransactionPayload::Message(payload) => Some(&payload.from),
            TransactionPayload::Transaction(value) => {
                value.get("from").and_then(Value::as_str)
            }
        }
    }
}

/// Build the method-specific payload from the raw RPC parameters.
///
/// - `eth_sendTransaction` / `eth_signTransaction`: first parameter
///   verbatim.
/// - `eth_sign`: `[from, message]`.
/// - `personal_sign`: `[message, from]` — reversed relative to
///   `eth_sign`, normalized to the same `{from, message}` shape.
pub fn extract_payload(method: &str, params: &[Value]) -> Result<TransactionPayload> {
    match method {
        "eth_sendTransaction" | "eth_signTransaction" => {
            let transaction = params.first().cloned().ok_or_else(|| {
                Error::invalid_request(format!("{method} requires a transaction parameter"))
            })?;
            Ok(TransactionPayload::Transaction(transaction))
        }
        "eth_sign" => Ok(TransactionPayload::Message(SignaturePayload {
            from: string_param(method, params, 0)?,
            message: string_param(method, params, 1)?,
        })),
        "personal_sign" => Ok(TransactionPayload::Message(SignaturePayload {
            from: string_param(method, params, 1)?,
            message: string_param(method, params, 0)?,
        })),
        other => Err(Error::MethodNotSupported(other.to_string())),
    }
}

fn string_param(method: &str, params: &[Value], index: usize) -> Result<String> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| {
            Error::invalid_request(format!("{method} requires a string parameter at {index}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> TransactionContext {
        TransactionContext {
            chain_id: 1,
            current_balance: None,
        }
    }

    #[test]
    fn test_kind_mapping_is_total() {
        assert_eq!(
            kind_for_method("eth_sendTransaction").unwrap(),
            TransactionKind::SignTransaction
        );
        assert_eq!(
            kind_for_method("eth_signTransaction").unwrap(),
            TransactionKind::SignTransaction
        );
        assert_eq!(kind_for_method("eth_sign").unwrap(), TransactionKind::Sign);
        assert_eq!(
            kind_for_method("personal_sign").unwrap(),
            TransactionKind::Sign
        );
        assert!(matches!(
            kind_for_method("eth_getBalance"),
            Err(Error::MethodNotSupported(_))
        ));
    }

    #[test]
    fn test_eth_sign_and_personal_sign_normalize_identically() {
        let from_eth_sign =
            extract_payload("eth_sign", &[json!("0xabc"), json!("0xdeadbeef")]).unwrap();
        let from_personal_sign =
            extract_payload("personal_sign", &[json!("0xdeadbeef"), json!("0xabc")]).unwrap();

        assert_eq!(from_eth_sign, from_personal_sign);
        assert_eq!(
            from_eth_sign,
            TransactionPayload::Message(SignaturePayload {
                from: "0xabc".to_string(),
                message: "0xdeadbeef".to_string(),
            })
        );
    }

    #[test]
    fn test_transaction_payload_is_verbatim() {
        let tx = json!({"from": "0xabc", "to": "0xdef", "value": "0x1", "unknownField": true});
        let payload = extract_payload("eth_sendTransaction", &[tx.clone()]).unwrap();
        assert_eq!(payload, TransactionPayload::Transaction(tx));
    }

    #[test]
    fn test_missing_parameters_fail() {
        assert!(matches!(
            extract_payload("eth_sendTransaction", &[]),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            extract_payload("eth_sign", &[json!("0xabc")]),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            extract_payload("personal_sign", &[json!("0xdeadbeef")]),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_fresh_id_per_transaction() {
        let request =
            JsonRpcRequest::new(1, "eth_sign", vec![json!("0xabc"), json!("0xdeadbeef")]);
        let first = Transaction::from_request(&request, context()).unwrap();
        let second = Transaction::from_request(&request, context()).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_serialized_shape() {
        let request =
            JsonRpcRequest::new(1, "eth_sign", vec![json!("0xabc"), json!("0xdeadbeef")]);
        let transaction = Transaction::from_request(
            &request,
            TransactionContext {
                chain_id: 4,
                current_balance: Some("0x10".to_string()),
            },
        )
        .unwrap();

        let value = serde_json::to_value(&transaction).unwrap();
        assert_eq!(value["kind"], json!("ETH_SIGN"));
        assert_eq!(value["payload"], json!({"from": "0xabc", "message": "0xdeadbeef"}));
        assert_eq!(value["context"], json!({"chainId": 4, "currentBalance": "0x10"}));
    }

    #[test]
    fn test_from_address() {
        let message = Transaction::from_request(
            &JsonRpcRequest::new(1, "eth_sign", vec![json!("0xabc"), json!("0x01")]),
            context(),
        )
        .unwrap();
        assert_eq!(message.from_address(), Some("0xabc"));

        let transaction = Transaction::from_request(
            &JsonRpcRequest::new(1, "eth_sendTransaction", vec![json!({"from": "0xdef"})]),
            context(),
        )
        .unwrap();
        assert_eq!(transaction.from_address(), Some("0xdef"));
    }
}
