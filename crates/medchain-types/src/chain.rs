//! Chain identifiers and the records exchanged with the registry contract.
//!
//! Results coming back from the contract are untyped JSON. They are decoded
//! here, at the boundary, into [`ChainRecord`]; any other shape is rejected
//! with [`TypesError::Schema`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{is_prefixed_hex, Address, TypesError, IDENTIFIER_LEN};

/// A 32-byte registry identifier rendered as `0x` + 64 lowercase hex digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(String);

impl ChainId {
    /// Parse a chain identifier, normalising to lowercase.
    pub fn parse(value: &str) -> crate::Result<Self> {
        let trimmed = value.trim();
        if is_prefixed_hex(trimmed, IDENTIFIER_LEN) {
            Ok(Self(format!("0x{}", trimmed[2..].to_ascii_lowercase())))
        } else {
            Err(TypesError::InvalidChainId(value.to_string()))
        }
    }

    /// Interpret an optional raw value; malformed input counts as absent.
    pub fn from_raw(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| Self::parse(v).ok())
    }

    pub fn from_bytes(bytes: &[u8; IDENTIFIER_LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainId {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChainId {
    type Error = TypesError;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<ChainId> for String {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Handle of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    pub hash: String,
}

/// A state-changing call on the registry contract, signed by the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ContractCall {
    RegisterData {
        storage_hash: String,
        name: String,
        data_type: String,
    },
    PurchaseAccess {
        chain_id: ChainId,
        /// Attached value in wei, as a decimal string.
        value_wei: String,
    },
    SetRole {
        address: Address,
        /// [`Role::code`](crate::Role::code) of the role being granted.
        role: u8,
    },
}

/// An entry held by the registry contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRecord {
    pub storage_hash: String,
    pub patient_name: String,
    pub data_type: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub owner: Address,
    pub is_public: bool,
    /// Price in wei.
    pub price_wei: u128,
}

const FIELDS: [&str; 7] = [
    "storageHash",
    "patientName",
    "dataType",
    "timestamp",
    "owner",
    "isPublic",
    "price",
];

impl ChainRecord {
    /// Decode a contract result, either the positional tuple returned by
    /// `getData` or an object keyed by field name.
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        match value {
            Value::Array(fields) => Self::from_positional(fields),
            Value::Object(map) => Self::from_named(map),
            other => Err(TypesError::Schema(format!(
                "expected array or object, got {}",
                json_kind(other)
            ))),
        }
    }

    fn from_positional(fields: &[Value]) -> crate::Result<Self> {
        if fields.len() != FIELDS.len() {
            return Err(TypesError::Schema(format!(
                "expected {} positional fields, got {}",
                FIELDS.len(),
                fields.len()
            )));
        }
        Self::decode(|i| fields.get(i))
    }

    fn from_named(map: &Map<String, Value>) -> crate::Result<Self> {
        Self::decode(|i| map.get(FIELDS[i]))
    }

    fn decode<'a>(get: impl Fn(usize) -> Option<&'a Value>) -> crate::Result<Self> {
        let field = |i: usize| {
            get(i).ok_or_else(|| TypesError::Schema(format!("missing field '{}'", FIELDS[i])))
        };
        Ok(Self {
            storage_hash: as_string(field(0)?, FIELDS[0])?,
            patient_name: as_string(field(1)?, FIELDS[1])?,
            data_type: as_string(field(2)?, FIELDS[2])?,
            timestamp: as_integer(field(3)?, FIELDS[3])?
                .try_into()
                .map_err(|_| TypesError::Schema("timestamp out of range".into()))?,
            owner: Address::new(as_string(field(4)?, FIELDS[4])?),
            is_public: field(5)?
                .as_bool()
                .ok_or_else(|| TypesError::Schema("'isPublic' is not a boolean".into()))?,
            price_wei: as_integer(field(6)?, FIELDS[6])?,
        })
    }
}

fn as_string(value: &Value, name: &str) -> crate::Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TypesError::Schema(format!("'{name}' is not a string")))
}

/// Big integers arrive either as JSON numbers or decimal strings.
fn as_integer(value: &Value, name: &str) -> crate::Result<u128> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| TypesError::Schema(format!("'{name}' is not an unsigned integer"))),
        Value::String(s) => s
            .parse::<u128>()
            .map_err(|_| TypesError::Schema(format!("'{name}' is not a decimal integer"))),
        other => Err(TypesError::Schema(format!(
            "'{name}' has type {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of checking a chain identifier against the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub chain_id: ChainId,
    pub is_valid: bool,
    pub storage_hash: Option<String>,
    pub owner: Option<Address>,
    pub timestamp: Option<u64>,
}

impl IntegrityReport {
    pub fn not_found(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            is_valid: false,
            storage_hash: None,
            owner: None,
            timestamp: None,
        }
    }

    pub fn from_record(chain_id: ChainId, record: &ChainRecord) -> Self {
        Self {
            chain_id,
            is_valid: true,
            storage_hash: Some(record.storage_hash.clone()),
            owner: Some(record.owner.clone()),
            timestamp: Some(record.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use serde_json::json;

    const ID: &str = "0xAB00000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_chain_id_normalises_case() {
        let id = ChainId::parse(ID).expect("parse");
        assert_eq!(id.as_str(), ID.to_ascii_lowercase());
        assert_eq!(ChainId::parse(&ID.to_ascii_lowercase()).expect("parse"), id);
    }

    #[test]
    fn test_malformed_chain_id_is_absent() {
        assert!(ChainId::from_raw(None).is_none());
        assert!(ChainId::from_raw(Some("0x1234")).is_none());
        assert!(ChainId::from_raw(Some("not-hex")).is_none());
        assert!(ChainId::from_raw(Some(ID)).is_some());
    }

    #[test]
    fn test_decode_positional() {
        let raw = json!([
            "QmX7vKj9sH2pL3mN8qR4tY6uI0oP1zX2cV3bN4mM5sA6dF7g",
            "Blood Panel",
            "Lab",
            1_700_000_000u64,
            "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
            true,
            "50000000000000000"
        ]);
        let record = ChainRecord::from_value(&raw).expect("decode");
        assert_eq!(record.patient_name, "Blood Panel");
        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.price_wei, 50_000_000_000_000_000);
        assert!(record.is_public);
    }

    #[test]
    fn test_decode_named() {
        let raw = json!({
            "storageHash": "f01551e20aa",
            "patientName": "MRI",
            "dataType": "Imaging",
            "timestamp": "1700000001",
            "owner": "0x8d3f000000000000000000000000000000002a1b",
            "isPublic": false,
            "price": 0
        });
        let record = ChainRecord::from_value(&raw).expect("decode");
        assert_eq!(record.timestamp, 1_700_000_001);
        assert_eq!(record.price_wei, 0);
    }

    #[test]
    fn test_decode_rejects_wrong_shapes() {
        assert!(matches!(
            ChainRecord::from_value(&json!("0x00")),
            Err(TypesError::Schema(_))
        ));
        assert!(matches!(
            ChainRecord::from_value(&json!(["a", "b"])),
            Err(TypesError::Schema(_))
        ));
        let bad_flag = json!(["h", "n", "t", 1, "0x00", "yes", "1"]);
        assert!(matches!(
            ChainRecord::from_value(&bad_flag),
            Err(TypesError::Schema(_))
        ));
    }

    #[test]
    fn test_contract_call_serialization() {
        let call = ContractCall::SetRole {
            address: Address::new("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"),
            role: Role::Patient.code(),
        };
        let value = serde_json::to_value(&call).expect("serialize");
        assert_eq!(value["method"], "set_role");
        assert_eq!(value["role"], 1);
    }
}
