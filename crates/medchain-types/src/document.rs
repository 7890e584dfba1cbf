//! Uploaded document metadata as kept in the document registry.

use serde::{Deserialize, Serialize};

use crate::{Address, ChainId};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Metadata for one uploaded artifact.
///
/// Persisted as camelCase JSON so registries written by other clients of the
/// same origin stay readable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub size_label: String,
    /// Decimal ether string.
    #[serde(default)]
    pub price: String,
    /// Content address; absent when the upload never completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_url: Option<String>,
    /// Raw registry identifier; see [`DocumentRecord::verified_chain_id`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    /// Unix seconds.
    #[serde(default)]
    pub uploaded_at: u64,
}

impl DocumentRecord {
    /// The chain identifier, if present and well formed.
    pub fn verified_chain_id(&self) -> Option<ChainId> {
        ChainId::from_raw(self.chain_id.as_deref())
    }

    pub fn is_verified(&self) -> bool {
        self.verified_chain_id().is_some()
    }

    /// The storage hash, if present and shaped like a content identifier.
    pub fn well_formed_storage_hash(&self) -> Option<&str> {
        self.storage_hash
            .as_deref()
            .filter(|hash| is_content_identifier(hash))
    }

    /// Verified and backed by retrievable content.
    pub fn is_purchasable(&self) -> bool {
        self.is_verified() && self.well_formed_storage_hash().is_some()
    }

    pub fn is_owned_by(&self, account: &Address) -> bool {
        self.owner.as_ref() == Some(account)
    }
}

/// A registry entry as presented by the marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedDocument {
    #[serde(flatten)]
    pub record: DocumentRecord,
    pub verified: bool,
    pub downloads: u32,
}

impl ListedDocument {
    pub fn new(record: DocumentRecord, downloads: u32) -> Self {
        let verified = record.is_verified();
        Self {
            record,
            verified,
            downloads,
        }
    }
}

impl AsRef<DocumentRecord> for DocumentRecord {
    fn as_ref(&self) -> &DocumentRecord {
        self
    }
}

impl AsRef<DocumentRecord> for ListedDocument {
    fn as_ref(&self) -> &DocumentRecord {
        &self.record
    }
}

/// Render a byte count the way upload forms show it, e.g. `2.40 MB`.
pub fn size_label(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// True for CIDv0 (`Qm` + 44 base58 characters), CIDv1 base32 (`b…`) and
/// CIDv1 base16 (`f…`) content identifiers.
pub fn is_content_identifier(hash: &str) -> bool {
    const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

    if let Some(rest) = hash.strip_prefix("Qm") {
        return rest.len() == 44 && rest.bytes().all(|b| BASE58.contains(&b));
    }
    if let Some(rest) = hash.strip_prefix('b') {
        return rest.len() >= 50
            && rest
                .bytes()
                .all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b));
    }
    if let Some(rest) = hash.strip_prefix('f') {
        return rest.len() >= 8
            && rest.len() % 2 == 0
            && rest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    }
    false
}
