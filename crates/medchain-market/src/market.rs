//! Marketplace operations.
//!
//! [`MarketService`] is what the researcher-facing surface talks to: it lists
//! and searches the registry, settles purchases, gates downloads and checks
//! chain identifiers against the registry contract. Documents are addressed
//! by storage hash, the key the registry deduplicates on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use medchain_types::ether::format_ether;
use medchain_types::{
    Address, ChainId, ChainRecord, DocumentRecord, IntegrityReport, ListedDocument, NetworkInfo,
    Role, TransactionRecord, TxHandle, TxKind,
};

use crate::ledger::OwnershipLedger;
use crate::pricing::PricingProvider;
use crate::providers::{Collaborators, RegistryContract, StorageProvider, WalletProvider};
use crate::purchase::{PurchaseOutcome, PurchaseService};
use crate::registry::{self, DocumentRegistry};
use crate::transactions::{HistorySummary, TransactionLog};
use crate::{MarketError, Result};

/// The connected wallet as shown in the header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub address: Address,
    /// Decimal ether string.
    pub balance: String,
    pub network: NetworkInfo,
}

#[derive(Clone)]
pub struct MarketService {
    registry: DocumentRegistry,
    ledger: OwnershipLedger,
    transactions: TransactionLog,
    purchases: PurchaseService,
    wallet: Arc<dyn WalletProvider>,
    storage: Arc<dyn StorageProvider>,
    contract: Arc<dyn RegistryContract>,
    pricing: Arc<dyn PricingProvider>,
}

impl MarketService {
    pub fn new(collaborators: &Collaborators, fallback_recipient: Option<Address>) -> Self {
        Self {
            registry: DocumentRegistry::new(collaborators.store.clone()),
            ledger: OwnershipLedger::new(collaborators.store.clone()),
            transactions: TransactionLog::new(collaborators.store.clone()),
            purchases: PurchaseService::new(collaborators, fallback_recipient),
            wallet: collaborators.wallet.clone(),
            storage: collaborators.storage.clone(),
            contract: collaborators.contract.clone(),
            pricing: collaborators.pricing.clone(),
        }
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &OwnershipLedger {
        &self.ledger
    }

    /// Search the registry. With `purchasable_only`, unregistered documents
    /// and documents without retrievable content are hidden.
    pub fn browse(
        &self,
        search: &str,
        category: &str,
        purchasable_only: bool,
    ) -> Result<Vec<ListedDocument>> {
        let documents = self.registry.list_documents()?;
        let documents = if purchasable_only {
            registry::purchasable(&documents)
        } else {
            documents
        };
        let listed: Vec<ListedDocument> = registry::filter(&documents, search, category)
            .into_iter()
            .map(|record| {
                let downloads = self.pricing.downloads(&record);
                ListedDocument::new(record, downloads)
            })
            .collect();
        debug!(search, category, results = listed.len(), "registry browsed");
        Ok(listed)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        self.registry.categories()
    }

    pub fn find(&self, storage_hash: &str) -> Result<DocumentRecord> {
        self.registry
            .find_by_storage_hash(storage_hash)?
            .ok_or_else(|| MarketError::DocumentNotFound(storage_hash.to_string()))
    }

    pub async fn purchase(
        &self,
        storage_hash: &str,
        buyer: &Address,
        now: u64,
    ) -> Result<PurchaseOutcome> {
        let document = self.find(storage_hash)?;
        // Same rule as the purchasable listing.
        if document.is_verified() && !document.is_purchasable() {
            return Err(MarketError::Validation(format!(
                "'{}' has no retrievable content",
                document.name
            )));
        }
        self.purchases.purchase(&document, buyer, now).await
    }

    pub fn can_download(&self, storage_hash: &str, account: Option<&Address>) -> Result<bool> {
        let document = self.find(storage_hash)?;
        self.ledger.can_download(&document, account)
    }

    /// Retrieve a document's bytes for an account allowed to download it.
    pub async fn download(&self, storage_hash: &str, account: Option<&Address>) -> Result<Vec<u8>> {
        let document = self.find(storage_hash)?;
        if !self.ledger.can_download(&document, account)? {
            return Err(MarketError::AccessDenied(document.name));
        }
        let bytes = self
            .storage
            .retrieve(storage_hash)
            .await
            .map_err(|e| MarketError::external("storage", e))?;
        info!(name = %document.name, size = bytes.len(), "document downloaded");
        Ok(bytes)
    }

    /// Check a chain identifier against the registry contract.
    pub async fn verify_document(&self, raw_chain_id: &str) -> Result<IntegrityReport> {
        let chain_id = ChainId::parse(raw_chain_id)?;
        let report = match self
            .contract
            .get_data(&chain_id)
            .await
            .map_err(|e| MarketError::external("contract", e))?
        {
            Some(raw) => IntegrityReport::from_record(chain_id, &ChainRecord::from_value(&raw)?),
            None => IntegrityReport::not_found(chain_id),
        };
        info!(chain_id = %report.chain_id, valid = report.is_valid, "integrity checked");
        Ok(report)
    }

    pub async fn assign_role(&self, address: &Address, role: Role) -> Result<TxHandle> {
        if !address.is_well_formed() {
            return Err(MarketError::Validation(format!("invalid address '{address}'")));
        }
        let handle = self
            .contract
            .set_role(address, role)
            .await
            .map_err(|e| MarketError::external("contract", e))?;
        info!(address = %address.short(), role = ?role, tx = %handle.hash, "role assigned");
        Ok(handle)
    }

    pub async fn wallet_summary(&self) -> Result<WalletSummary> {
        let address = self
            .wallet
            .connect()
            .await
            .map_err(|e| MarketError::external("wallet", e))?;
        let balance = self
            .wallet
            .balance(&address)
            .await
            .map_err(|e| MarketError::external("wallet", e))?;
        let network = self
            .wallet
            .network()
            .await
            .map_err(|e| MarketError::external("wallet", e))?;
        Ok(WalletSummary {
            address,
            balance: format_ether(balance),
            network,
        })
    }

    pub fn history(&self, search: &str, kind: Option<TxKind>) -> Result<Vec<TransactionRecord>> {
        self.transactions.filter(search, kind)
    }

    pub fn history_summary(&self) -> Result<HistorySummary> {
        self.transactions.summary()
    }
}
