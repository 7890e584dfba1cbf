//! External collaborators.
//!
//! The wallet/signer, the content-addressed store and the registry contract
//! live outside this crate. They are reached only through these traits and
//! injected as trait objects by the composition root.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use medchain_db::KeyValueStore;
use medchain_types::{Address, ChainId, ContractCall, NetworkInfo, Role, TxHandle};

use crate::pricing::PricingProvider;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("user rejected the request")]
    Rejected,

    #[error("network error: {0}")]
    Network(String),

    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Other(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// The browser-injected wallet or any other signer.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the signer for its active account.
    async fn connect(&self) -> ProviderResult<Address>;

    /// Balance in wei.
    async fn balance(&self, address: &Address) -> ProviderResult<u128>;

    async fn network(&self) -> ProviderResult<NetworkInfo>;

    /// Transfer `amount_wei` from the active account to `to`.
    async fn send_value_transfer(&self, to: &Address, amount_wei: u128)
        -> ProviderResult<TxHandle>;

    async fn sign_and_send(&self, call: ContractCall) -> ProviderResult<TxHandle>;
}

/// Result of storing bytes in the content-addressed store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContent {
    /// Content identifier.
    pub hash: String,
    /// Retrieval URL for the content.
    pub url: String,
}

/// Content-addressed storage.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn upload(&self, bytes: &[u8], filename: &str) -> ProviderResult<StoredContent>;

    async fn retrieve(&self, hash: &str) -> ProviderResult<Vec<u8>>;

    async fn pin(&self, hash: &str) -> ProviderResult<()>;
}

/// Metadata anchored alongside a storage hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub name: String,
    pub data_type: String,
}

/// Outcome of `register_data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub tx_hash: String,
    /// Raw identifier from the registration event; may be missing or malformed.
    pub chain_id: Option<String>,
}

/// The on-chain medical data registry.
#[async_trait]
pub trait RegistryContract: Send + Sync {
    async fn register_data(
        &self,
        storage_hash: &str,
        metadata: &DocumentMetadata,
    ) -> ProviderResult<AnchorReceipt>;

    /// Raw entry for `chain_id`, or `None` if the contract holds none.
    /// Decode with [`medchain_types::ChainRecord::from_value`].
    async fn get_data(&self, chain_id: &ChainId) -> ProviderResult<Option<serde_json::Value>>;

    async fn purchase_access(&self, chain_id: &ChainId, value_wei: u128)
        -> ProviderResult<TxHandle>;

    async fn set_role(&self, address: &Address, role: Role) -> ProviderResult<TxHandle>;
}

/// Everything the marketplace services are built from.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub wallet: Arc<dyn WalletProvider>,
    pub storage: Arc<dyn StorageProvider>,
    pub contract: Arc<dyn RegistryContract>,
    pub pricing: Arc<dyn PricingProvider>,
}
