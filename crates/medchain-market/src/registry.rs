//! Document registry.
//!
//! The uploader's client appends [`DocumentRecord`]s to a JSON array stored
//! under [`DOCUMENTS_KEY`]; marketplace clients read the same array. Writers
//! never rewrite earlier entries. Duplicates by storage hash are collapsed
//! when reading: the later entry's content replaces the earlier one in the
//! earlier entry's position.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use medchain_db::KeyValueStore;
use medchain_types::{Address, DocumentRecord, ALL_CATEGORIES};

use crate::Result;

/// Store key holding the registry array.
pub const DOCUMENTS_KEY: &str = "uploadedDocuments";

#[derive(Clone)]
pub struct DocumentRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl DocumentRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The current registry, deduplicated by storage hash.
    ///
    /// Every call re-reads the store. Entries without a storage hash are
    /// kept individually.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut documents: Vec<DocumentRecord> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in self.records()? {
            match record.storage_hash.clone() {
                Some(hash) => match positions.get(&hash) {
                    Some(&index) => {
                        debug!(storage_hash = %hash, "replacing duplicate registry entry");
                        documents[index] = record;
                    }
                    None => {
                        positions.insert(hash, documents.len());
                        documents.push(record);
                    }
                },
                None => documents.push(record),
            }
        }

        Ok(documents)
    }

    /// Append a record. Earlier entries are never rewritten.
    pub fn add_document(&self, record: &DocumentRecord) -> Result<()> {
        let mut raw = self.read_raw()?;
        raw.push(serde_json::to_value(record)?);
        self.store.set(DOCUMENTS_KEY, &serde_json::to_string(&raw)?)?;
        debug!(
            name = %record.name,
            storage_hash = ?record.storage_hash,
            entries = raw.len(),
            "document added to registry"
        );
        Ok(())
    }

    /// Deduplicated entry with the given storage hash.
    pub fn find_by_storage_hash(&self, storage_hash: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .list_documents()?
            .into_iter()
            .find(|d| d.storage_hash.as_deref() == Some(storage_hash)))
    }

    /// Owner recorded by the earliest entry for `storage_hash`.
    pub fn original_owner(&self, storage_hash: &str) -> Result<Option<Address>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|d| d.storage_hash.as_deref() == Some(storage_hash))
            .find_map(|d| d.owner.filter(Address::is_well_formed)))
    }

    /// Distinct categories, sorted, preceded by `"all"`.
    pub fn categories(&self) -> Result<Vec<String>> {
        let distinct: BTreeSet<String> = self
            .list_documents()?
            .into_iter()
            .map(|d| d.category)
            .filter(|c| !c.is_empty() && c != ALL_CATEGORIES)
            .collect();
        Ok(std::iter::once(ALL_CATEGORIES.to_string())
            .chain(distinct)
            .collect())
    }

    /// Every decodable entry in write order, duplicates included.
    fn records(&self) -> Result<Vec<DocumentRecord>> {
        Ok(self
            .read_raw()?
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index, error = %e, "skipping undecodable registry entry");
                    None
                }
            })
            .collect())
    }

    fn read_raw(&self) -> Result<Vec<Value>> {
        match self.store.get(DOCUMENTS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Case-insensitive search over name and description, plus an exact
/// category match unless `category` is `"all"`.
pub fn filter<D>(documents: &[D], search: &str, category: &str) -> Vec<D>
where
    D: AsRef<DocumentRecord> + Clone,
{
    let needle = search.to_lowercase();
    documents
        .iter()
        .filter(|d| {
            let record = d.as_ref();
            let matches_search = record.name.to_lowercase().contains(&needle)
                || record.description.to_lowercase().contains(&needle);
            let matches_category = category == ALL_CATEGORIES || record.category == category;
            matches_search && matches_category
        })
        .cloned()
        .collect()
}

/// Documents that may be offered for sale: verified and backed by a
/// well-formed storage hash.
pub fn purchasable<D>(documents: &[D]) -> Vec<D>
where
    D: AsRef<DocumentRecord> + Clone,
{
    documents
        .iter()
        .filter(|d| d.as_ref().is_purchasable())
        .cloned()
        .collect()
}
