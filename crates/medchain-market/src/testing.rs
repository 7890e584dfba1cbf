//! In-memory collaborators for tests.
//!
//! Available to other crates with the `testing` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use medchain_db::MemoryStore;
use medchain_types::{Address, ChainId, ContractCall, NetworkInfo, Role, TxHandle, IDENTIFIER_LEN};

use crate::ledger::OwnershipLedger;
use crate::pricing::FixedPricing;
use crate::providers::{
    AnchorReceipt, Collaborators, DocumentMetadata, ProviderError, ProviderResult,
    RegistryContract, StorageProvider, StoredContent, WalletProvider,
};
use crate::registry::DocumentRegistry;
use crate::transactions::TransactionLog;

/// Account the mock wallet and contract act as.
pub const MOCK_ACCOUNT: &str = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1";

/// Price the mock contract records for every registration: 0.05 ether.
pub const MOCK_PRICE_WEI: u128 = 50_000_000_000_000_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn tx_hash(n: u64) -> String {
    format!("0x{n:064x}")
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Content-addressed storage held in memory.
pub struct MockStorage {
    available: AtomicBool,
    gate: Option<Arc<Semaphore>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    pins: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            gate: None,
            blobs: Mutex::new(HashMap::new()),
            pins: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a network error.
    pub fn unavailable() -> Self {
        let storage = Self::new();
        storage.set_available(false);
        storage
    }

    /// Uploads wait for a permit from `gate` before completing.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn insert(&self, hash: &str, bytes: Vec<u8>) {
        lock(&self.blobs).insert(hash.to_string(), bytes);
    }

    pub fn pinned(&self) -> Vec<String> {
        lock(&self.pins).clone()
    }

    pub fn stored_count(&self) -> usize {
        lock(&self.blobs).len()
    }

    fn check_available(&self) -> ProviderResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::Network("storage node unreachable".into()))
        }
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MockStorage {
    async fn upload(&self, bytes: &[u8], _filename: &str) -> ProviderResult<StoredContent> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| ProviderError::Other("upload gate closed".into()))?;
            permit.forget();
        }
        self.check_available()?;
        let hash = format!("f01551e20{}", blake3::hash(bytes).to_hex());
        lock(&self.blobs).insert(hash.clone(), bytes.to_vec());
        Ok(StoredContent {
            url: format!("memory://{hash}"),
            hash,
        })
    }

    async fn retrieve(&self, hash: &str) -> ProviderResult<Vec<u8>> {
        self.check_available()?;
        lock(&self.blobs)
            .get(hash)
            .cloned()
            .ok_or_else(|| ProviderError::Other(format!("content {hash} not found")))
    }

    async fn pin(&self, hash: &str) -> ProviderResult<()> {
        self.check_available()?;
        lock(&self.pins).push(hash.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A connected wallet with a fixed balance that records transfers.
pub struct MockWallet {
    account: Mutex<Option<Address>>,
    balance_wei: u128,
    fail: AtomicBool,
    counter: AtomicU64,
    transfers: Mutex<Vec<(Address, u128)>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            account: Mutex::new(Some(Address::new(MOCK_ACCOUNT))),
            balance_wei: 100 * medchain_types::WEI_PER_ETHER,
            fail: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            transfers: Mutex::new(Vec::new()),
        }
    }

    pub fn account(&self) -> Option<Address> {
        lock(&self.account).clone()
    }

    pub fn disconnect(&self) {
        *lock(&self.account) = None;
    }

    /// Make every transaction the user is asked to sign get rejected.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<(Address, u128)> {
        lock(&self.transfers).clone()
    }

    fn next_handle(&self) -> TxHandle {
        TxHandle {
            hash: tx_hash(self.counter.fetch_add(1, Ordering::SeqCst) + 1),
        }
    }

    fn check_signing(&self) -> ProviderResult<()> {
        if self.account().is_none() {
            return Err(ProviderError::NotConnected);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected);
        }
        Ok(())
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn connect(&self) -> ProviderResult<Address> {
        self.account().ok_or(ProviderError::NotConnected)
    }

    async fn balance(&self, _address: &Address) -> ProviderResult<u128> {
        Ok(self.balance_wei)
    }

    async fn network(&self) -> ProviderResult<NetworkInfo> {
        Ok(NetworkInfo {
            name: "Localhost".into(),
            chain_id: 1337,
        })
    }

    async fn send_value_transfer(&self, to: &Address, amount_wei: u128) -> ProviderResult<TxHandle> {
        self.check_signing()?;
        lock(&self.transfers).push((to.clone(), amount_wei));
        Ok(self.next_handle())
    }

    async fn sign_and_send(&self, _call: ContractCall) -> ProviderResult<TxHandle> {
        self.check_signing()?;
        Ok(self.next_handle())
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Registry contract state held in memory. Records are returned in the
/// contract's positional tuple form.
pub struct MockContract {
    records: Mutex<HashMap<ChainId, Value>>,
    counter: AtomicU64,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    omit_chain_ids: bool,
    purchases: Mutex<Vec<(ChainId, u128)>>,
    roles: Mutex<Vec<(Address, Role)>>,
}

impl MockContract {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            omit_chain_ids: false,
            purchases: Mutex::new(Vec::new()),
            roles: Mutex::new(Vec::new()),
        }
    }

    /// Every state-changing call is rejected.
    pub fn failing() -> Self {
        let contract = Self::new();
        contract.set_fail_writes(true);
        contract
    }

    /// Registrations succeed but report no chain identifier.
    pub fn without_chain_ids() -> Self {
        Self {
            omit_chain_ids: true,
            ..Self::new()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn insert_record(&self, chain_id: &ChainId, raw: Value) {
        lock(&self.records).insert(chain_id.clone(), raw);
    }

    pub fn purchases(&self) -> Vec<(ChainId, u128)> {
        lock(&self.purchases).clone()
    }

    pub fn roles(&self) -> Vec<(Address, Role)> {
        lock(&self.roles).clone()
    }

    fn check_writes(&self) -> ProviderResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(ProviderError::Rejected)
        } else {
            Ok(())
        }
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for MockContract {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryContract for MockContract {
    async fn register_data(
        &self,
        storage_hash: &str,
        metadata: &DocumentMetadata,
    ) -> ProviderResult<AnchorReceipt> {
        self.check_writes()?;
        let n = self.next();
        let mut id = [0u8; IDENTIFIER_LEN];
        id[IDENTIFIER_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        let chain_id = ChainId::from_bytes(&id);

        self.insert_record(
            &chain_id,
            json!([
                storage_hash,
                metadata.name,
                metadata.data_type,
                n,
                MOCK_ACCOUNT,
                true,
                MOCK_PRICE_WEI.to_string(),
            ]),
        );
        Ok(AnchorReceipt {
            tx_hash: tx_hash(n),
            chain_id: (!self.omit_chain_ids).then(|| chain_id.to_string()),
        })
    }

    async fn get_data(&self, chain_id: &ChainId) -> ProviderResult<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("rpc timeout".into()));
        }
        Ok(lock(&self.records).get(chain_id).cloned())
    }

    async fn purchase_access(&self, chain_id: &ChainId, value_wei: u128) -> ProviderResult<TxHandle> {
        self.check_writes()?;
        lock(&self.purchases).push((chain_id.clone(), value_wei));
        Ok(TxHandle {
            hash: tx_hash(self.next()),
        })
    }

    async fn set_role(&self, address: &Address, role: Role) -> ProviderResult<TxHandle> {
        self.check_writes()?;
        lock(&self.roles).push((address.clone(), role));
        Ok(TxHandle {
            hash: tx_hash(self.next()),
        })
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// A full set of mock collaborators sharing one in-memory store.
pub struct TestEnv {
    pub store: MemoryStore,
    pub wallet: Arc<MockWallet>,
    pub storage: Arc<MockStorage>,
    pub contract: Arc<MockContract>,
    pub collaborators: Collaborators,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_parts(MockStorage::new(), MockContract::new())
    }

    pub fn with_parts(storage: MockStorage, contract: MockContract) -> Self {
        let store = MemoryStore::new();
        let wallet = Arc::new(MockWallet::new());
        let storage = Arc::new(storage);
        let contract = Arc::new(contract);
        let collaborators = Collaborators {
            store: Arc::new(store.clone()),
            wallet: wallet.clone(),
            storage: storage.clone(),
            contract: contract.clone(),
            pricing: Arc::new(FixedPricing::new("0.05", 7)),
        };
        Self {
            store,
            wallet,
            storage,
            contract,
            collaborators,
        }
    }

    pub fn registry(&self) -> DocumentRegistry {
        DocumentRegistry::new(self.collaborators.store.clone())
    }

    pub fn ledger(&self) -> OwnershipLedger {
        OwnershipLedger::new(self.collaborators.store.clone())
    }

    pub fn transactions(&self) -> TransactionLog {
        TransactionLog::new(self.collaborators.store.clone())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
