//! # medchain-market
//!
//! Client-side core of the medical data marketplace.
//!
//! ## Modules
//!
//! - [`providers`] — traits for the wallet, content storage and registry contract
//! - [`registry`] — uploaded-document registry with read-time deduplication
//! - [`ledger`] — per-account purchase ledger gating downloads
//! - [`wizard`] — the register → hash → upload → verify → success state machine
//! - [`purchase`] — settlement through the contract or a direct transfer
//! - [`market`] — marketplace operations composed from the above
//! - [`transactions`] — searchable transaction history
//! - [`pricing`] — display price and download-count providers
//! - [`upload`] — file admission policy applied before the wizard sees a file
//! - [`identifier`] — registration hash derivation
//!
//! All services are constructed explicitly from a [`providers::Collaborators`]
//! bundle; nothing here holds global state.

pub mod identifier;
pub mod ledger;
pub mod market;
pub mod pricing;
pub mod providers;
pub mod purchase;
pub mod registry;
pub mod transactions;
pub mod upload;
pub mod wizard;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use medchain_db::DbError;
use medchain_types::{TypesError, WizardStage};

pub use providers::{Collaborators, ProviderError};

/// Errors surfaced by marketplace operations. None are fatal; the caller
/// reports the message and the user re-triggers the action.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Required input is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The re-entered registration hash differs from the generated one.
    #[error("entered hash does not match the generated hash")]
    HashMismatch,

    /// A storage, wallet or contract call failed or was rejected.
    #[error("{service} unavailable: {detail}")]
    ExternalUnavailable {
        service: &'static str,
        detail: String,
    },

    /// Nobody to pay for a direct purchase.
    #[error("no recipient could be resolved for '{0}'")]
    NoResolvableRecipient(String),

    /// The document has no usable chain identifier.
    #[error("'{0}' is not registered on chain")]
    NotRegistered(String),

    /// No registry entry with the given storage hash.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The account may not download the document.
    #[error("access denied to '{0}'")]
    AccessDenied(String),

    /// A wizard operation was called in the wrong stage.
    #[error("operation requires stage {expected}, wizard is at {actual}")]
    InvalidStage {
        expected: WizardStage,
        actual: WizardStage,
    },

    /// A wizard operation is already in flight for this session.
    #[error("another registration step is still in progress")]
    OperationPending,

    /// An external result did not match its expected schema.
    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl MarketError {
    /// Wrap a collaborator failure, keeping its message verbatim.
    pub fn external(service: &'static str, err: ProviderError) -> Self {
        MarketError::ExternalUnavailable {
            service,
            detail: err.to_string(),
        }
    }
}

impl From<TypesError> for MarketError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::Schema(detail) => MarketError::Schema(detail),
            other => MarketError::Validation(other.to_string()),
        }
    }
}

/// Convenience result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_keeps_message() {
        let err = MarketError::external("wallet", ProviderError::Rejected);
        assert_eq!(err.to_string(), "wallet unavailable: user rejected the request");
    }

    #[test]
    fn test_types_error_mapping() {
        let schema: MarketError = TypesError::Schema("bad".into()).into();
        assert!(matches!(schema, MarketError::Schema(_)));

        let invalid: MarketError = TypesError::InvalidChainId("0x1".into()).into();
        assert!(matches!(invalid, MarketError::Validation(_)));
    }
}
