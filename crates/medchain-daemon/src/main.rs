//! medchain-daemon: the medical data marketplace daemon.
//!
//! Single OS process running a Tokio async runtime. Clients drive the
//! registration wizard and the marketplace via JSON-RPC over a Unix socket.

mod commands;
mod config;
mod dev;
mod rpc;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use medchain_db::SqliteStore;
use medchain_market::market::MarketService;
use medchain_market::pricing::RandomPricing;
use medchain_market::providers::{Collaborators, WalletProvider};
use medchain_market::upload::UploadPolicy;
use medchain_market::wizard::{RegistrationWizard, WizardHandle};
use medchain_types::ether::parse_ether;
use medchain_types::{Address, NetworkInfo};

use crate::config::DaemonConfig;
use crate::dev::{DevChain, LocalContentStore};
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Marketplace operations.
    pub market: MarketService,
    /// This session's registration wizard.
    pub wizard: WizardHandle,
    /// File admission for uploads.
    pub upload_policy: UploadPolicy,
    /// Wallet the session connects through.
    pub wallet: Arc<dyn WalletProvider>,
    /// Development chain, when the daemon runs one.
    pub dev_chain: Option<Arc<DevChain>>,
    /// Connected account, if any.
    pub session: RwLock<Option<Address>>,
}

impl DaemonState {
    pub fn new(
        config: &DaemonConfig,
        collaborators: &Collaborators,
        dev_chain: Option<Arc<DevChain>>,
    ) -> Self {
        let fallback = Some(Address::new(&config.market.fallback_recipient))
            .filter(Address::is_well_formed);
        let upload_policy = UploadPolicy::new(
            &config.upload.allowed_extensions,
            config.upload.max_file_bytes,
        );
        Self {
            market: MarketService::new(collaborators, fallback),
            wizard: WizardHandle::new(RegistrationWizard::new(collaborators)),
            upload_policy,
            wallet: collaborators.wallet.clone(),
            dev_chain,
            session: RwLock::new(None),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("medchain={}", config.advanced.log_level).parse()?);
    if config.advanced.log_file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.advanced.log_file)
            .with_context(|| format!("opening log file {}", config.advanced.log_file))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }

    info!("medchain daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open the origin-scoped store
    let db_path = data_dir.join("medchain.db");
    let store = SqliteStore::open(&db_path, config.storage.origin.clone())
        .with_context(|| format!("opening {}", db_path.display()))?;

    // 3. Local development collaborators
    let dev_chain = Arc::new(DevChain::new(
        config.dev.account_count,
        parse_ether(&config.dev.initial_balance).context("dev.initial_balance")?,
        parse_ether(&config.dev.access_price).context("dev.access_price")?,
        NetworkInfo {
            name: config.network.name.clone(),
            chain_id: config.network.chain_id,
        },
    ));
    let storage = LocalContentStore::new(config.content_dir());
    info!(
        accounts = dev_chain.accounts().len(),
        content = %storage.root().display(),
        "development chain ready"
    );

    let collaborators = Collaborators {
        store: Arc::new(store),
        wallet: dev_chain.clone(),
        storage: Arc::new(storage),
        contract: dev_chain.clone(),
        pricing: Arc::new(RandomPricing::new(
            config.market.price_min_milli_ether,
            config.market.price_max_milli_ether,
            config.market.max_downloads,
        )),
    };

    if !config.market.fallback_recipient.is_empty()
        && !Address::new(&config.market.fallback_recipient).is_well_formed()
    {
        warn!(
            value = %config.market.fallback_recipient,
            "ignoring malformed market.fallback_recipient"
        );
    }

    // 4. Build daemon state
    let state = Arc::new(DaemonState::new(&config, &collaborators, Some(dev_chain)));

    // 5. Start IPC server
    let socket_path = data_dir.join("medchain.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 6. Run the RPC server until shutdown
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
