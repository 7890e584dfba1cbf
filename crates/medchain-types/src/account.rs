//! Wallet accounts, roles and network descriptors.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{is_prefixed_hex, TypesError, ADDRESS_LEN};

/// A wallet address as handed out by the signer.
///
/// Comparison and hashing ignore ASCII case, matching how checksummed and
/// lowercase renderings of the same account are treated by wallets. The
/// address is not required to be well formed: records written by older
/// clients may carry shortened display forms such as `0x742d...8e9f`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap an address string, trimming surrounding whitespace.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// Parse a strictly well-formed address (`0x` + 40 hex digits).
    pub fn parse(value: &str) -> crate::Result<Self> {
        let candidate = Self::new(value);
        if candidate.is_well_formed() {
            Ok(candidate)
        } else {
            Err(TypesError::InvalidAddress(value.to_string()))
        }
    }

    /// True if the address can receive a transfer.
    pub fn is_well_formed(&self) -> bool {
        is_prefixed_hex(&self.0, ADDRESS_LEN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used for storage keys.
    pub fn canonical(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Shortened `0x1234...abcd` rendering for logs.
    pub fn short(&self) -> String {
        if self.0.len() <= 10 || !self.0.is_ascii() {
            return self.0.clone();
        }
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

/// Account role as recorded by the registry contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    None,
    Patient,
    Researcher,
}

impl Role {
    /// Numeric value used by the contract's `setRole`.
    pub fn code(self) -> u8 {
        match self {
            Role::None => 0,
            Role::Patient => 1,
            Role::Researcher => 2,
        }
    }

    pub fn from_code(code: u8) -> crate::Result<Self> {
        match code {
            0 => Ok(Role::None),
            1 => Ok(Role::Patient),
            2 => Ok(Role::Researcher),
            other => Err(TypesError::UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Role::None),
            "patient" => Ok(Role::Patient),
            "researcher" => Ok(Role::Researcher),
            _ => Err(TypesError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// Network the wallet is connected to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub name: String,
    /// Numeric network chain ID (not a document chain identifier).
    pub chain_id: u64,
}
