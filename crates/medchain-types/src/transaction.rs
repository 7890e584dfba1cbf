//! Transaction history entries.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Address, TypesError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// A document anchored in the registry.
    Registration,
    /// Access bought through the registry contract.
    Access,
    /// Direct value transfer to an uploader.
    Payment,
    /// A registration hash confirmed by its owner.
    Verification,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Registration => "registration",
            TxKind::Access => "access",
            TxKind::Payment => "payment",
            TxKind::Verification => "verification",
        }
    }
}

impl FromStr for TxKind {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "registration" => Ok(TxKind::Registration),
            "access" => Ok(TxKind::Access),
            "payment" => Ok(TxKind::Payment),
            "verification" => Ok(TxKind::Verification),
            other => Err(TypesError::UnknownVariant {
                kind: "transaction kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Confirmed,
    Pending,
    Failed,
}

/// One row of an account's transaction history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub tx_hash: String,
    pub kind: TxKind,
    pub from: Option<Address>,
    pub to: Option<Address>,
    /// Decimal ether string.
    pub value: String,
    pub status: TxStatus,
    pub description: String,
    /// Unix seconds.
    pub timestamp: u64,
}
