//! In-process development chain.
//!
//! Plays the part of both the browser wallet and the registry contract on a
//! local test network: a fixed set of funded accounts, value transfers
//! between them and the registry's storage. Every state-changing contract
//! method is encoded as a [`ContractCall`] and executed through the same
//! signing path as `sign_and_send`, from the active account.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use medchain_market::providers::{
    AnchorReceipt, DocumentMetadata, ProviderError, ProviderResult, RegistryContract,
    WalletProvider,
};
use medchain_types::{Address, ChainId, ChainRecord, ContractCall, NetworkInfo, Role, TxHandle};

/// Mutable chain state, guarded by one lock so transfers are atomic.
#[derive(Default)]
struct Ledger {
    active: usize,
    balances: HashMap<Address, u128>,
    records: HashMap<ChainId, ChainRecord>,
    roles: HashMap<Address, Role>,
}

pub struct DevChain {
    accounts: Vec<Address>,
    network: NetworkInfo,
    access_price_wei: u128,
    nonce: AtomicU64,
    state: Mutex<Ledger>,
}

/// Outcome of executing a call: the transaction and, for registrations,
/// the new identifier.
struct Execution {
    handle: TxHandle,
    chain_id: Option<ChainId>,
}

impl DevChain {
    /// Create `account_count` deterministic accounts holding
    /// `initial_balance_wei` each. The first half are registered as
    /// patients, the rest as researchers.
    pub fn new(
        account_count: usize,
        initial_balance_wei: u128,
        access_price_wei: u128,
        network: NetworkInfo,
    ) -> Self {
        let accounts: Vec<Address> = (0..account_count.max(1)).map(dev_account).collect();
        let half = accounts.len() / 2;

        let mut ledger = Ledger::default();
        for (index, account) in accounts.iter().enumerate() {
            ledger.balances.insert(account.clone(), initial_balance_wei);
            let role = if index < half.max(1) {
                Role::Patient
            } else {
                Role::Researcher
            };
            ledger.roles.insert(account.clone(), role);
        }

        Self {
            accounts,
            network,
            access_price_wei,
            nonce: AtomicU64::new(0),
            state: Mutex::new(ledger),
        }
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Switch the active account, as a user would in their wallet.
    pub fn select_account(&self, index: usize) -> ProviderResult<Address> {
        let account = self
            .accounts
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::Other(format!("no dev account {index}")))?;
        self.lock()?.active = index;
        info!(account = %account.short(), index, "dev account selected");
        Ok(account)
    }

    pub fn role_of(&self, address: &Address) -> ProviderResult<Role> {
        Ok(self.lock()?.roles.get(address).copied().unwrap_or_default())
    }

    fn lock(&self) -> ProviderResult<MutexGuard<'_, Ledger>> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Other("dev chain state poisoned".into()))
    }

    fn active_account(&self, ledger: &Ledger) -> ProviderResult<Address> {
        self.accounts
            .get(ledger.active)
            .cloned()
            .ok_or(ProviderError::NotConnected)
    }

    fn next_tx(&self, from: &Address, payload: &[u8]) -> TxHandle {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = blake3::Hasher::new();
        hasher.update(from.canonical().as_bytes());
        hasher.update(&nonce.to_le_bytes());
        hasher.update(payload);
        TxHandle {
            hash: format!("0x{}", hasher.finalize().to_hex()),
        }
    }

    fn transfer(ledger: &mut Ledger, from: &Address, to: &Address, amount: u128) -> ProviderResult<()> {
        let balance = ledger.balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(ProviderError::Other("insufficient funds".into()));
        }
        ledger.balances.insert(from.clone(), balance - amount);
        let credited = ledger.balances.get(to).copied().unwrap_or(0).saturating_add(amount);
        ledger.balances.insert(to.clone(), credited);
        Ok(())
    }

    /// Execute a contract call signed by the active account.
    fn execute(&self, call: ContractCall) -> ProviderResult<Execution> {
        let mut ledger = self.lock()?;
        let sender = self.active_account(&ledger)?;
        let payload = serde_json::to_vec(&call).map_err(|e| ProviderError::Other(e.to_string()))?;
        let handle = self.next_tx(&sender, &payload);

        let chain_id = match call {
            ContractCall::RegisterData {
                storage_hash,
                name,
                data_type,
            } => {
                let chain_id = ChainId::from_bytes(blake3::hash(handle.hash.as_bytes()).as_bytes());
                ledger.records.insert(
                    chain_id.clone(),
                    ChainRecord {
                        storage_hash,
                        patient_name: name,
                        data_type,
                        timestamp: unix_now(),
                        owner: sender.clone(),
                        is_public: true,
                        price_wei: self.access_price_wei,
                    },
                );
                info!(chain_id = %chain_id, owner = %sender.short(), "data registered");
                Some(chain_id)
            }
            ContractCall::PurchaseAccess { chain_id, value_wei } => {
                let value: u128 = value_wei
                    .parse()
                    .map_err(|_| ProviderError::Other(format!("invalid value '{value_wei}'")))?;
                let record = ledger
                    .records
                    .get(&chain_id)
                    .cloned()
                    .ok_or_else(|| ProviderError::Other("record does not exist".into()))?;
                if value < record.price_wei {
                    return Err(ProviderError::Other("insufficient payment".into()));
                }
                Self::transfer(&mut ledger, &sender, &record.owner, value)?;
                info!(chain_id = %chain_id, buyer = %sender.short(), "access granted");
                None
            }
            ContractCall::SetRole { address, role } => {
                let role = Role::from_code(role).map_err(|e| ProviderError::Other(e.to_string()))?;
                ledger.roles.insert(address, role);
                None
            }
        };

        Ok(Execution { handle, chain_id })
    }
}

/// Deterministic development account `index`.
pub fn dev_account(index: usize) -> Address {
    let digest = blake3::hash(format!("medchain-dev-account-{index}").as_bytes());
    Address::new(format!("0x{}", hex::encode(&digest.as_bytes()[..20])))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn record_tuple(record: &ChainRecord) -> Value {
    json!([
        record.storage_hash,
        record.patient_name,
        record.data_type,
        record.timestamp,
        record.owner,
        record.is_public,
        record.price_wei.to_string(),
    ])
}

#[async_trait]
impl WalletProvider for DevChain {
    async fn connect(&self) -> ProviderResult<Address> {
        let ledger = self.lock()?;
        self.active_account(&ledger)
    }

    async fn balance(&self, address: &Address) -> ProviderResult<u128> {
        Ok(self.lock()?.balances.get(address).copied().unwrap_or(0))
    }

    async fn network(&self) -> ProviderResult<NetworkInfo> {
        Ok(self.network.clone())
    }

    async fn send_value_transfer(&self, to: &Address, amount_wei: u128) -> ProviderResult<TxHandle> {
        if !to.is_well_formed() {
            return Err(ProviderError::Other(format!("invalid recipient '{to}'")));
        }
        let mut ledger = self.lock()?;
        let from = self.active_account(&ledger)?;
        Self::transfer(&mut ledger, &from, to, amount_wei)?;
        let handle = self.next_tx(&from, &amount_wei.to_le_bytes());
        info!(from = %from.short(), to = %to.short(), amount_wei, tx = %handle.hash, "value transferred");
        Ok(handle)
    }

    async fn sign_and_send(&self, call: ContractCall) -> ProviderResult<TxHandle> {
        self.execute(call).map(|execution| execution.handle)
    }
}

#[async_trait]
impl RegistryContract for DevChain {
    async fn register_data(
        &self,
        storage_hash: &str,
        metadata: &DocumentMetadata,
    ) -> ProviderResult<AnchorReceipt> {
        let execution = self.execute(ContractCall::RegisterData {
            storage_hash: storage_hash.to_string(),
            name: metadata.name.clone(),
            data_type: metadata.data_type.clone(),
        })?;
        Ok(AnchorReceipt {
            tx_hash: execution.handle.hash,
            chain_id: execution.chain_id.map(String::from),
        })
    }

    async fn get_data(&self, chain_id: &ChainId) -> ProviderResult<Option<Value>> {
        Ok(self.lock()?.records.get(chain_id).map(record_tuple))
    }

    async fn purchase_access(&self, chain_id: &ChainId, value_wei: u128) -> ProviderResult<TxHandle> {
        self.sign_and_send(ContractCall::PurchaseAccess {
            chain_id: chain_id.clone(),
            value_wei: value_wei.to_string(),
        })
        .await
    }

    async fn set_role(&self, address: &Address, role: Role) -> ProviderResult<TxHandle> {
        self.sign_and_send(ContractCall::SetRole {
            address: address.clone(),
            role: role.code(),
        })
        .await
    }
}
