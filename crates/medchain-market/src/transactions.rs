//! Transaction history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use medchain_db::KeyValueStore;
use medchain_types::{TransactionRecord, TxKind, TxStatus};

use crate::Result;

/// Store key holding the history array.
pub const TRANSACTIONS_KEY: &str = "transactionHistory";

/// Totals shown under the history table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total: usize,
    pub confirmed: usize,
    pub pending: usize,
    pub failed: usize,
    pub payments: usize,
}

#[derive(Clone)]
pub struct TransactionLog {
    store: Arc<dyn KeyValueStore>,
}

impl TransactionLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, tx: TransactionRecord) -> Result<()> {
        let mut history = self.read()?;
        debug!(tx_hash = %tx.tx_hash, kind = tx.kind.as_str(), "transaction logged");
        history.push(tx);
        self.store
            .set(TRANSACTIONS_KEY, &serde_json::to_string(&history)?)?;
        Ok(())
    }

    /// Every transaction, newest first. Ties keep the later write first.
    pub fn list(&self) -> Result<Vec<TransactionRecord>> {
        let mut history = self.read()?;
        history.reverse();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }

    /// Counts by status, plus the number of direct payments.
    pub fn summary(&self) -> Result<HistorySummary> {
        let history = self.read()?;
        let mut summary = HistorySummary {
            total: history.len(),
            ..HistorySummary::default()
        };
        for tx in &history {
            match tx.status {
                TxStatus::Confirmed => summary.confirmed += 1,
                TxStatus::Pending => summary.pending += 1,
                TxStatus::Failed => summary.failed += 1,
            }
            if tx.kind == TxKind::Payment {
                summary.payments += 1;
            }
        }
        Ok(summary)
    }

    /// Case-insensitive search over hash and description; `None` keeps
    /// every kind.
    pub fn filter(&self, search: &str, kind: Option<TxKind>) -> Result<Vec<TransactionRecord>> {
        let needle = search.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|tx| {
                tx.tx_hash.to_lowercase().contains(&needle)
                    || tx.description.to_lowercase().contains(&needle)
            })
            .filter(|tx| kind.map_or(true, |k| tx.kind == k))
            .collect())
    }

    fn read(&self) -> Result<Vec<TransactionRecord>> {
        match self.store.get(TRANSACTIONS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Parse a kind filter where `"all"` means no filter.
pub fn parse_kind_filter(value: &str) -> Result<Option<TxKind>> {
    if value.is_empty() || value == medchain_types::ALL_CATEGORIES {
        return Ok(None);
    }
    Ok(Some(value.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_db::MemoryStore;
    use medchain_types::Address;

    const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn tx(hash: &str, kind: TxKind, description: &str, timestamp: u64) -> TransactionRecord {
        TransactionRecord {
            tx_hash: hash.into(),
            kind,
            from: Some(Address::new(ALICE)),
            to: None,
            value: "0.0".into(),
            status: TxStatus::Confirmed,
            description: description.into(),
            timestamp,
        }
    }

    fn seeded() -> TransactionLog {
        let log = TransactionLog::new(Arc::new(MemoryStore::new()));
        log.record(tx("0xaa01", TxKind::Registration, "Registered Blood Panel", 10))
            .expect("record");
        log.record(tx("0xbb02", TxKind::Access, "Purchased MRI access", 30))
            .expect("record");
        log.record(tx("0xcc03", TxKind::Verification, "Verified hash", 20))
            .expect("record");
        log
    }

    #[test]
    fn test_list_newest_first() {
        let hashes: Vec<String> = seeded()
            .list()
            .expect("list")
            .into_iter()
            .map(|t| t.tx_hash)
            .collect();
        assert_eq!(hashes, vec!["0xbb02", "0xcc03", "0xaa01"]);
    }

    #[test]
    fn test_filter_by_search_and_kind() {
        let log = seeded();
        assert_eq!(log.filter("MRI", None).expect("filter").len(), 1);
        assert_eq!(log.filter("0xAA", None).expect("filter").len(), 1);
        assert_eq!(log.filter("", Some(TxKind::Access)).expect("filter").len(), 1);
        assert_eq!(log.filter("blood", Some(TxKind::Access)).expect("filter").len(), 0);
        assert_eq!(log.filter("", None).expect("filter").len(), 3);
    }

    #[test]
    fn test_summary_counts() {
        let log = seeded();
        let mut failed = tx("0xdd04", TxKind::Payment, "Paid for X-ray", 40);
        failed.status = TxStatus::Failed;
        log.record(failed).expect("record");
        let mut pending = tx("0xee05", TxKind::Payment, "Paid for ECG", 50);
        pending.status = TxStatus::Pending;
        log.record(pending).expect("record");

        assert_eq!(
            log.summary().expect("summary"),
            HistorySummary {
                total: 5,
                confirmed: 3,
                pending: 1,
                failed: 1,
                payments: 2,
            }
        );
    }

    #[test]
    fn test_summary_of_empty_log() {
        let log = TransactionLog::new(Arc::new(MemoryStore::new()));
        assert_eq!(log.summary().expect("summary"), HistorySummary::default());
    }

    #[test]
    fn test_parse_kind_filter() {
        assert_eq!(parse_kind_filter("all").expect("parse"), None);
        assert_eq!(parse_kind_filter("payment").expect("parse"), Some(TxKind::Payment));
        assert!(parse_kind_filter("refund").is_err());
    }
}
