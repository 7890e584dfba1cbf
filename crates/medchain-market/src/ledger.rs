//! Per-account purchase ledger.
//!
//! Each buyer has a JSON array of chain identifiers under
//! `purchases_<lowercase address>`. Membership is a set: marking the same
//! purchase twice leaves one entry. Entries are never removed.

use std::sync::Arc;

use tracing::{debug, info};

use medchain_db::KeyValueStore;
use medchain_types::{Address, ChainId, DocumentRecord};

use crate::Result;

const PURCHASES_PREFIX: &str = "purchases_";

fn purchases_key(buyer: &Address) -> String {
    format!("{PURCHASES_PREFIX}{}", buyer.canonical())
}

#[derive(Clone)]
pub struct OwnershipLedger {
    store: Arc<dyn KeyValueStore>,
}

impl OwnershipLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Chain identifiers purchased by `buyer`, in purchase order.
    pub fn purchases(&self, buyer: &Address) -> Result<Vec<ChainId>> {
        let raw: Vec<String> = match self.store.get(&purchases_key(buyer))? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        Ok(raw
            .iter()
            .filter_map(|id| ChainId::from_raw(Some(id)))
            .collect())
    }

    /// False when either side is absent.
    pub fn has_purchased(&self, buyer: Option<&Address>, chain_id: Option<&ChainId>) -> Result<bool> {
        let (Some(buyer), Some(chain_id)) = (buyer, chain_id) else {
            return Ok(false);
        };
        Ok(self.purchases(buyer)?.contains(chain_id))
    }

    /// Record an access grant. Returns `true` if it was not already held.
    pub fn mark_purchased(&self, buyer: &Address, chain_id: &ChainId) -> Result<bool> {
        let mut purchases = self.purchases(buyer)?;
        if purchases.contains(chain_id) {
            debug!(buyer = %buyer.short(), chain_id = %chain_id, "purchase already recorded");
            return Ok(false);
        }
        purchases.push(chain_id.clone());

        let raw: Vec<&str> = purchases.iter().map(ChainId::as_str).collect();
        self.store
            .set(&purchases_key(buyer), &serde_json::to_string(&raw)?)?;
        info!(buyer = %buyer.short(), chain_id = %chain_id, "purchase recorded");
        Ok(true)
    }

    /// The uploader may always retrieve their own content; anyone else needs
    /// a recorded purchase. Nobody connected means no access.
    pub fn can_download(&self, document: &DocumentRecord, account: Option<&Address>) -> Result<bool> {
        let Some(account) = account else {
            return Ok(false);
        };
        if document.is_owned_by(account) {
            return Ok(true);
        }
        self.has_purchased(Some(account), document.verified_chain_id().as_ref())
    }
}
