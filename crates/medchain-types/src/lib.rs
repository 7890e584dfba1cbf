//! # medchain-types
//!
//! Shared domain types used across the medchain workspace: document and
//! purchase records, wallet addresses, chain identifiers, wizard stages,
//! transaction history entries and ether amounts.

pub mod account;
pub mod chain;
pub mod document;
pub mod ether;
pub mod transaction;
pub mod wizard;

pub use account::{Address, NetworkInfo, Role};
pub use chain::{ChainId, ChainRecord, ContractCall, IntegrityReport, TxHandle};
pub use document::{DocumentRecord, ListedDocument};
pub use transaction::{TransactionRecord, TxKind, TxStatus};
pub use wizard::{RegistrationForm, WizardSnapshot, WizardStage};

/// Category value that disables category filtering.
pub const ALL_CATEGORIES: &str = "all";

/// Wei per ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Number of fractional digits in an ether amount.
pub const ETHER_DECIMALS: usize = 18;

/// Length in bytes of a chain identifier and of a generated registration hash.
pub const IDENTIFIER_LEN: usize = 32;

/// Length in bytes of a wallet address.
pub const ADDRESS_LEN: usize = 20;

/// Error types for parsing domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Wallet address is not `0x` followed by 40 hex digits.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Chain identifier is not `0x` followed by 64 hex digits.
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    /// Ether amount could not be parsed.
    #[error("invalid ether amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: &'static str },

    /// Unknown role, stage or transaction kind name.
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// A raw record did not match the expected schema.
    #[error("schema mismatch: {0}")]
    Schema(String),
}

/// Convenience result type for type parsing.
pub type Result<T> = std::result::Result<T, TypesError>;

/// True if `s` is `0x` followed by exactly `bytes * 2` hex digits.
pub(crate) fn is_prefixed_hex(s: &str, bytes: usize) -> bool {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => {
            digits.len() == bytes * 2 && digits.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_hex() {
        assert!(is_prefixed_hex("0x00ff", 2));
        assert!(is_prefixed_hex("0XABcd", 2));
        assert!(!is_prefixed_hex("00ff", 2));
        assert!(!is_prefixed_hex("0x00f", 2));
        assert!(!is_prefixed_hex("0x00fg", 2));
    }
}
