//! The patient-side registration wizard.
//!
//! ```text
//! Register ──submit──▶ Hash ──continue──▶ Upload ──upload──▶ Verify ──verify──▶ Success
//!    ▲                                                                            │
//!    └──────────────────────────── restart (from any stage) ◀────────────────────┘
//! ```
//!
//! Every operation checks the current stage first and fails with
//! [`MarketError::InvalidStage`] without touching state when called out of
//! order. A failed step leaves the wizard where it was.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use medchain_types::document::size_label;
use medchain_types::{
    Address, ChainId, DocumentRecord, RegistrationForm, TransactionRecord, TxKind, TxStatus,
    WizardSnapshot, WizardStage,
};

use crate::identifier::registration_hash;
use crate::pricing::PricingProvider;
use crate::providers::{Collaborators, DocumentMetadata, RegistryContract, StorageProvider};
use crate::registry::DocumentRegistry;
use crate::transactions::TransactionLog;
use crate::upload::UploadFile;
use crate::{MarketError, Result};

pub struct RegistrationWizard {
    stage: WizardStage,
    form: RegistrationForm,
    generated_hash: Option<String>,
    entered_hash: Option<String>,
    uploaded_documents: Vec<DocumentRecord>,

    registry: DocumentRegistry,
    transactions: TransactionLog,
    storage: Arc<dyn StorageProvider>,
    contract: Arc<dyn RegistryContract>,
    pricing: Arc<dyn PricingProvider>,
}

impl RegistrationWizard {
    pub fn new(collaborators: &Collaborators) -> Self {
        Self {
            stage: WizardStage::Register,
            form: RegistrationForm::default(),
            generated_hash: None,
            entered_hash: None,
            uploaded_documents: Vec::new(),
            registry: DocumentRegistry::new(collaborators.store.clone()),
            transactions: TransactionLog::new(collaborators.store.clone()),
            storage: collaborators.storage.clone(),
            contract: collaborators.contract.clone(),
            pricing: collaborators.pricing.clone(),
        }
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            stage: self.stage,
            form: self.form.clone(),
            generated_hash: self.generated_hash.clone(),
            entered_hash: self.entered_hash.clone(),
            uploaded_documents: self.uploaded_documents.clone(),
        }
    }

    /// Register → Hash. Product name and description are required.
    pub fn submit_registration(&mut self, form: RegistrationForm, now_ms: u64) -> Result<String> {
        self.expect_stage(WizardStage::Register)?;
        if form.product_name.trim().is_empty() {
            return Err(MarketError::Validation("product name is required".into()));
        }
        if form.description.trim().is_empty() {
            return Err(MarketError::Validation("description is required".into()));
        }

        let hash = registration_hash(&form, now_ms);
        info!(product = %form.product_name, hash = %hash, "registration submitted");
        self.form = form;
        self.generated_hash = Some(hash.clone());
        self.stage = WizardStage::Hash;
        Ok(hash)
    }

    pub fn generated_hash(&self) -> Option<&str> {
        self.generated_hash.as_deref()
    }

    /// Text to place on the clipboard.
    pub fn copy_hash(&self) -> Result<String> {
        self.expect_stage(WizardStage::Hash)?;
        self.generated_hash
            .clone()
            .ok_or_else(|| MarketError::Validation("no hash has been generated".into()))
    }

    /// Hash → Upload.
    pub fn continue_to_upload(&mut self) -> Result<()> {
        self.expect_stage(WizardStage::Hash)?;
        self.stage = WizardStage::Upload;
        Ok(())
    }

    /// Upload → Verify.
    ///
    /// Stores the bytes, anchors them in the registry contract and appends
    /// the resulting record to the document registry. Only a storage or
    /// registry write failure aborts the step. Pinning and anchoring failures
    /// are logged and the record is kept unregistered; a failed history
    /// write is logged once the record is stored.
    pub async fn upload(&mut self, file: UploadFile, owner: &Address, now: u64) -> Result<DocumentRecord> {
        self.expect_stage(WizardStage::Upload)?;

        let stored = self
            .storage
            .upload(file.bytes(), file.filename())
            .await
            .map_err(|e| MarketError::external("storage", e))?;
        info!(file = file.filename(), hash = %stored.hash, size = file.size(), "content stored");

        if let Err(e) = self.storage.pin(&stored.hash).await {
            warn!(hash = %stored.hash, error = %e, "failed to pin content");
        }

        let price = self.pricing.quote(file.filename(), file.size());
        let metadata = DocumentMetadata {
            name: self.form.product_name.clone(),
            data_type: self.form.category.clone(),
        };
        let (chain_id, anchor_tx) = match self.contract.register_data(&stored.hash, &metadata).await {
            Ok(receipt) => match ChainId::from_raw(receipt.chain_id.as_deref()) {
                Some(id) => (Some(id), Some(receipt.tx_hash)),
                None => {
                    warn!(
                        hash = %stored.hash,
                        raw = ?receipt.chain_id,
                        "registration returned no usable chain id"
                    );
                    (None, Some(receipt.tx_hash))
                }
            },
            Err(e) => {
                warn!(hash = %stored.hash, error = %e, "failed to anchor document");
                (None, None)
            }
        };

        let record = DocumentRecord {
            name: self.form.product_name.clone(),
            description: self.form.description.clone(),
            category: self.form.category.clone(),
            size_label: size_label(file.size()),
            price,
            storage_hash: Some(stored.hash.clone()),
            retrieval_url: Some(stored.url),
            chain_id: chain_id.as_ref().map(|id| id.to_string()),
            owner: Some(owner.clone()),
            uploaded_at: now,
        };
        self.registry.add_document(&record)?;

        let status = if chain_id.is_some() {
            TxStatus::Confirmed
        } else {
            TxStatus::Failed
        };
        // The record is stored from here on; history is best-effort.
        if let Err(e) = self.transactions.record(TransactionRecord {
            tx_hash: anchor_tx.unwrap_or_else(|| stored.hash.clone()),
            kind: TxKind::Registration,
            from: Some(owner.clone()),
            to: None,
            value: "0.0".into(),
            status,
            description: format!("Registered {}", record.name),
            timestamp: now,
        }) {
            warn!(hash = %stored.hash, error = %e, "failed to log registration");
        }

        info!(
            name = %record.name,
            hash = %stored.hash,
            chain_id = ?record.chain_id,
            "document uploaded"
        );
        self.uploaded_documents.push(record.clone());
        self.stage = WizardStage::Verify;
        Ok(record)
    }

    /// Verify → Success when `entered` matches the generated hash exactly.
    pub fn verify(&mut self, entered: &str, now: u64) -> Result<()> {
        self.expect_stage(WizardStage::Verify)?;
        self.entered_hash = Some(entered.to_string());

        let Some(generated) = self.generated_hash.clone() else {
            return Err(MarketError::HashMismatch);
        };
        if entered != generated {
            warn!("entered hash does not match");
            return Err(MarketError::HashMismatch);
        }

        self.transactions.record(TransactionRecord {
            tx_hash: generated,
            kind: TxKind::Verification,
            from: self.uploaded_documents.last().and_then(|d| d.owner.clone()),
            to: None,
            value: "0.0".into(),
            status: TxStatus::Confirmed,
            description: format!("Verified {}", self.form.product_name),
            timestamp: now,
        })?;
        info!(product = %self.form.product_name, "registration verified");
        self.stage = WizardStage::Success;
        Ok(())
    }

    /// Back to an empty Register stage. Registry entries are kept.
    pub fn restart(&mut self) {
        info!(from = %self.stage, "wizard restarted");
        self.stage = WizardStage::Register;
        self.form = RegistrationForm::default();
        self.generated_hash = None;
        self.entered_hash = None;
        self.uploaded_documents.clear();
    }

    /// Leave a finished wizard, returning the documents it uploaded.
    pub fn return_home(&mut self) -> Result<Vec<DocumentRecord>> {
        self.expect_stage(WizardStage::Success)?;
        let documents = std::mem::take(&mut self.uploaded_documents);
        self.restart();
        Ok(documents)
    }

    fn expect_stage(&self, expected: WizardStage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(MarketError::InvalidStage {
                expected,
                actual: self.stage,
            })
        }
    }
}

/// Shared handle to one session's wizard.
///
/// At most one operation runs at a time. A second caller does not wait:
/// it gets [`MarketError::OperationPending`].
#[derive(Clone)]
pub struct WizardHandle {
    inner: Arc<Mutex<RegistrationWizard>>,
}

impl WizardHandle {
    pub fn new(wizard: RegistrationWizard) -> Self {
        Self {
            inner: Arc::new(Mutex::new(wizard)),
        }
    }

    /// Exclusive access for one operation.
    pub fn acquire(&self) -> Result<OwnedMutexGuard<RegistrationWizard>> {
        self.inner
            .clone()
            .try_lock_owned()
            .map_err(|_| MarketError::OperationPending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockContract, MockStorage, TestEnv};
    use crate::registry::DOCUMENTS_KEY;
    use crate::transactions::TRANSACTIONS_KEY;
    use crate::upload::UploadPolicy;
    use medchain_db::{DbError, KeyValueStore, MemoryStore};

    const OWNER: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn form(name: &str, description: &str) -> RegistrationForm {
        RegistrationForm {
            product_name: name.into(),
            description: description.into(),
            category: "Lab".into(),
        }
    }

    fn file() -> UploadFile {
        UploadPolicy::default()
            .admit("panel.pdf", vec![7u8; 2048])
            .expect("admit")
    }

    async fn at_upload(env: &TestEnv) -> (RegistrationWizard, String) {
        let mut wizard = RegistrationWizard::new(&env.collaborators);
        let hash = wizard
            .submit_registration(form("Blood Panel", "desc"), 1_700_000_000_000)
            .expect("submit");
        wizard.continue_to_upload().expect("continue");
        (wizard, hash)
    }

    #[test]
    fn test_empty_name_rejected() {
        let env = TestEnv::new();
        let mut wizard = RegistrationWizard::new(&env.collaborators);
        let err = wizard.submit_registration(form("", "desc"), 1).expect_err("must fail");
        assert!(matches!(err, MarketError::Validation(_)));
        assert_eq!(wizard.stage(), WizardStage::Register);

        let err = wizard.submit_registration(form("Name", "   "), 1).expect_err("must fail");
        assert!(matches!(err, MarketError::Validation(_)));
        assert_eq!(wizard.stage(), WizardStage::Register);
    }

    #[test]
    fn test_submit_generates_hash() {
        let env = TestEnv::new();
        let mut wizard = RegistrationWizard::new(&env.collaborators);
        let hash = wizard
            .submit_registration(form("Blood Panel", "desc"), 42)
            .expect("submit");
        assert_eq!(wizard.stage(), WizardStage::Hash);
        assert_eq!(wizard.generated_hash(), Some(hash.as_str()));
        assert_eq!(wizard.copy_hash().expect("copy"), hash);
    }

    #[test]
    fn test_wrong_stage_rejected() {
        let env = TestEnv::new();
        let mut wizard = RegistrationWizard::new(&env.collaborators);
        assert!(matches!(
            wizard.continue_to_upload(),
            Err(MarketError::InvalidStage {
                expected: WizardStage::Hash,
                actual: WizardStage::Register
            })
        ));
        assert!(matches!(
            wizard.verify("0x00", 0),
            Err(MarketError::InvalidStage { .. })
        ));
        assert!(matches!(wizard.return_home(), Err(MarketError::InvalidStage { .. })));
        assert_eq!(wizard.stage(), WizardStage::Register);
    }

    #[tokio::test]
    async fn test_upload_persists_and_advances() {
        let env = TestEnv::new();
        let (mut wizard, _) = at_upload(&env).await;
        let owner = Address::new(OWNER);

        let record = wizard.upload(file(), &owner, 1_700_000_000).await.expect("upload");
        assert_eq!(wizard.stage(), WizardStage::Verify);
        assert!(record.is_verified());
        assert_eq!(record.owner.as_ref(), Some(&owner));
        assert_eq!(record.size_label, "0.00 MB");

        let stored = env.registry().list_documents().expect("list");
        assert_eq!(stored, vec![record.clone()]);
        assert_eq!(wizard.snapshot().uploaded_documents, vec![record]);
        assert_eq!(env.storage.pinned().len(), 1);

        let txs = env.transactions().list().expect("list");
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TxKind::Registration);
        assert_eq!(txs[0].status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_storage_unavailable_persists_nothing() {
        let env = TestEnv::with_parts(MockStorage::unavailable(), MockContract::new());
        let (mut wizard, _) = at_upload(&env).await;

        let err = wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect_err("must fail");
        assert!(matches!(err, MarketError::ExternalUnavailable { service: "storage", .. }));
        assert_eq!(wizard.stage(), WizardStage::Upload);
        assert!(env.registry().list_documents().expect("list").is_empty());
        assert!(env.transactions().list().expect("list").is_empty());
    }

    /// Shared memory store whose history writes fail.
    struct HistoryWritesFail(MemoryStore);

    impl KeyValueStore for HistoryWritesFail {
        fn get(&self, key: &str) -> medchain_db::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> medchain_db::Result<()> {
            if key == TRANSACTIONS_KEY {
                return Err(DbError::Poisoned);
            }
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> medchain_db::Result<()> {
            self.0.remove(key)
        }
    }

    fn raw_entries(env: &TestEnv) -> usize {
        let raw = env.store.get(DOCUMENTS_KEY).expect("get").unwrap_or_default();
        serde_json::from_str::<Vec<serde_json::Value>>(&raw)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_history_write_failure_still_advances() {
        let env = TestEnv::new();
        let mut collaborators = env.collaborators.clone();
        collaborators.store = Arc::new(HistoryWritesFail(env.store.clone()));
        let mut wizard = RegistrationWizard::new(&collaborators);
        wizard
            .submit_registration(form("Blood Panel", "desc"), 1)
            .expect("submit");
        wizard.continue_to_upload().expect("continue");

        let record = wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect("upload");
        assert_eq!(wizard.stage(), WizardStage::Verify);
        assert_eq!(wizard.snapshot().uploaded_documents, vec![record]);
        assert_eq!(raw_entries(&env), 1);
        assert!(env.transactions().list().expect("list").is_empty());
        assert_eq!(env.storage.stored_count(), 1);

        // A retry is refused by the stage guard instead of registering again.
        assert!(matches!(
            wizard.upload(file(), &Address::new(OWNER), 2).await,
            Err(MarketError::InvalidStage { .. })
        ));
        assert_eq!(raw_entries(&env), 1);
        assert_eq!(wizard.stage(), WizardStage::Verify);
    }

    #[tokio::test]
    async fn test_anchor_failure_keeps_record_unregistered() {
        let env = TestEnv::with_parts(MockStorage::new(), MockContract::failing());
        let (mut wizard, _) = at_upload(&env).await;

        let record = wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect("upload");
        assert!(!record.is_verified());
        assert_eq!(wizard.stage(), WizardStage::Verify);
        assert_eq!(env.registry().list_documents().expect("list").len(), 1);
        assert_eq!(
            env.transactions().list().expect("list")[0].status,
            TxStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_anchor_without_chain_id() {
        let env = TestEnv::with_parts(MockStorage::new(), MockContract::without_chain_ids());
        let (mut wizard, _) = at_upload(&env).await;
        let record = wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect("upload");
        assert_eq!(record.chain_id, None);
    }

    #[tokio::test]
    async fn test_verify_mismatch_then_match() {
        let env = TestEnv::new();
        let (mut wizard, hash) = at_upload(&env).await;
        wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect("upload");

        let err = wizard.verify("0xdeadbeef", 2).expect_err("must fail");
        assert!(matches!(err, MarketError::HashMismatch));
        assert_eq!(wizard.stage(), WizardStage::Verify);

        // Case differences count as a mismatch.
        let err = wizard.verify(&hash.to_uppercase(), 2).expect_err("must fail");
        assert!(matches!(err, MarketError::HashMismatch));

        wizard.verify(&hash, 3).expect("verify");
        assert_eq!(wizard.stage(), WizardStage::Success);

        let kinds: Vec<TxKind> = env
            .transactions()
            .list()
            .expect("list")
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec![TxKind::Verification, TxKind::Registration]);
    }

    #[tokio::test]
    async fn test_restart_retains_registry() {
        let env = TestEnv::new();
        let (mut wizard, hash) = at_upload(&env).await;
        wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect("upload");
        wizard.verify(&hash, 2).expect("verify");

        wizard.restart();
        let snapshot = wizard.snapshot();
        assert_eq!(snapshot.stage, WizardStage::Register);
        assert_eq!(snapshot.form, RegistrationForm::default());
        assert_eq!(snapshot.generated_hash, None);
        assert_eq!(snapshot.entered_hash, None);
        assert!(snapshot.uploaded_documents.is_empty());
        assert_eq!(env.registry().list_documents().expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_return_home() {
        let env = TestEnv::new();
        let (mut wizard, hash) = at_upload(&env).await;
        wizard
            .upload(file(), &Address::new(OWNER), 1)
            .await
            .expect("upload");
        wizard.verify(&hash, 2).expect("verify");

        let documents = wizard.return_home().expect("home");
        assert_eq!(documents.len(), 1);
        assert_eq!(wizard.stage(), WizardStage::Register);
    }

    #[tokio::test]
    async fn test_handle_rejects_concurrent_operation() {
        let env = TestEnv::new();
        let handle = WizardHandle::new(RegistrationWizard::new(&env.collaborators));

        let guard = handle.acquire().expect("first");
        assert!(matches!(handle.acquire(), Err(MarketError::OperationPending)));
        drop(guard);
        assert!(handle.acquire().is_ok());
    }
}
