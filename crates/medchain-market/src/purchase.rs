//! Buying access to a registered document.
//!
//! Settlement prefers the registry contract: if it holds a record for the
//! document's chain identifier, access is bought through `purchaseAccess`
//! at the on-chain price. Otherwise the buyer pays the uploader directly.
//! Either way the ledger is only updated after the external call succeeds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use medchain_types::ether::{format_ether, parse_ether};
use medchain_types::{
    Address, ChainId, ChainRecord, DocumentRecord, TransactionRecord, TxKind, TxStatus,
};

use crate::ledger::OwnershipLedger;
use crate::providers::{Collaborators, RegistryContract, WalletProvider};
use crate::registry::DocumentRegistry;
use crate::transactions::TransactionLog;
use crate::{MarketError, Result};

/// How a purchase was settled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementRoute {
    Contract,
    DirectTransfer { recipient: Address },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    /// The buyer uploaded the document or bought it before. Nothing was sent.
    AlreadyOwned,
    Purchased {
        tx_hash: String,
        route: SettlementRoute,
    },
}

#[derive(Clone)]
pub struct PurchaseService {
    registry: DocumentRegistry,
    ledger: OwnershipLedger,
    transactions: TransactionLog,
    wallet: Arc<dyn WalletProvider>,
    contract: Arc<dyn RegistryContract>,
    fallback_recipient: Option<Address>,
}

impl PurchaseService {
    pub fn new(collaborators: &Collaborators, fallback_recipient: Option<Address>) -> Self {
        Self {
            registry: DocumentRegistry::new(collaborators.store.clone()),
            ledger: OwnershipLedger::new(collaborators.store.clone()),
            transactions: TransactionLog::new(collaborators.store.clone()),
            wallet: collaborators.wallet.clone(),
            contract: collaborators.contract.clone(),
            fallback_recipient: fallback_recipient.filter(Address::is_well_formed),
        }
    }

    /// Who gets paid for a direct purchase: the document's owner, then the
    /// owner of the earliest registry entry with the same storage hash, then
    /// the configured fallback.
    pub fn resolve_recipient(&self, document: &DocumentRecord) -> Result<Address> {
        if let Some(owner) = document.owner.as_ref().filter(|a| a.is_well_formed()) {
            return Ok(owner.clone());
        }
        if let Some(hash) = document.storage_hash.as_deref() {
            if let Some(owner) = self.registry.original_owner(hash)? {
                return Ok(owner);
            }
        }
        self.fallback_recipient
            .clone()
            .ok_or_else(|| MarketError::NoResolvableRecipient(document.name.clone()))
    }

    pub async fn purchase(
        &self,
        document: &DocumentRecord,
        buyer: &Address,
        now: u64,
    ) -> Result<PurchaseOutcome> {
        let chain_id = document
            .verified_chain_id()
            .ok_or_else(|| MarketError::NotRegistered(document.name.clone()))?;

        if self.ledger.can_download(document, Some(buyer))? {
            info!(buyer = %buyer.short(), chain_id = %chain_id, "document already owned");
            return Ok(PurchaseOutcome::AlreadyOwned);
        }

        let (tx, route) = match self.lookup(&chain_id).await? {
            Some(record) => self.buy_through_contract(document, &chain_id, &record, buyer, now).await?,
            None => self.pay_directly(document, buyer, now).await?,
        };

        self.ledger.mark_purchased(buyer, &chain_id)?;
        let tx_hash = tx.tx_hash.clone();
        self.transactions.record(tx)?;
        Ok(PurchaseOutcome::Purchased { tx_hash, route })
    }

    /// On-chain record for `chain_id`. A failed lookup is treated as "no
    /// record"; a record with an unexpected shape is an error.
    async fn lookup(&self, chain_id: &ChainId) -> Result<Option<ChainRecord>> {
        match self.contract.get_data(chain_id).await {
            Ok(Some(raw)) => Ok(Some(ChainRecord::from_value(&raw)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "registry lookup failed, paying directly");
                Ok(None)
            }
        }
    }

    async fn buy_through_contract(
        &self,
        document: &DocumentRecord,
        chain_id: &ChainId,
        record: &ChainRecord,
        buyer: &Address,
        now: u64,
    ) -> Result<(TransactionRecord, SettlementRoute)> {
        let handle = self
            .contract
            .purchase_access(chain_id, record.price_wei)
            .await
            .map_err(|e| MarketError::external("contract", e))?;
        info!(
            buyer = %buyer.short(),
            chain_id = %chain_id,
            price_wei = record.price_wei,
            tx = %handle.hash,
            "access purchased through registry"
        );
        let tx = TransactionRecord {
            tx_hash: handle.hash,
            kind: TxKind::Access,
            from: Some(buyer.clone()),
            to: Some(record.owner.clone()),
            value: format_ether(record.price_wei),
            status: TxStatus::Confirmed,
            description: format!("Purchased access to {}", document.name),
            timestamp: now,
        };
        Ok((tx, SettlementRoute::Contract))
    }

    async fn pay_directly(
        &self,
        document: &DocumentRecord,
        buyer: &Address,
        now: u64,
    ) -> Result<(TransactionRecord, SettlementRoute)> {
        let recipient = self.resolve_recipient(document)?;
        let amount = parse_ether(&document.price)?;
        let handle = self
            .wallet
            .send_value_transfer(&recipient, amount)
            .await
            .map_err(|e| MarketError::external("wallet", e))?;
        info!(
            buyer = %buyer.short(),
            recipient = %recipient.short(),
            amount_wei = amount,
            tx = %handle.hash,
            "paid uploader directly"
        );
        let tx = TransactionRecord {
            tx_hash: handle.hash,
            kind: TxKind::Payment,
            from: Some(buyer.clone()),
            to: Some(recipient.clone()),
            value: format_ether(amount),
            status: TxStatus::Confirmed,
            description: format!("Payment for {}", document.name),
            timestamp: now,
        };
        Ok((tx, SettlementRoute::DirectTransfer { recipient }))
    }
}
