//! Transaction signing pipeline.

pub mod signer;
pub mod subprovider;
pub mod transaction;

pub use signer::{HttpTransactionSigner, TransactionSigner};
pub use subprovider::SignatureSubprovider;
pub use transaction::{
    kind_for_method, SignaturePayload, Transaction, TransactionContext, TransactionKind,
    TransactionPayload, DEFAULT_SIGNATURE_METHODS,
};
