//! Wallet & role command handlers.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use medchain_market::MarketError;
use medchain_types::{Address, Role};

use super::{connected_account, str_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Connect the session to the wallet's active account.
///
/// On the development chain `account_index` switches accounts first.
pub async fn connect_wallet(state: &Arc<DaemonState>, params: &Value) -> Result {
    if let Some(index) = params.get("account_index") {
        let index = index
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| RpcError::invalid_params("account_index must be a number"))?;
        let chain = state
            .dev_chain
            .as_ref()
            .ok_or_else(|| RpcError::invalid_params("account selection needs the dev chain"))?;
        chain
            .select_account(index)
            .map_err(|e| RpcError::invalid_params(&e.to_string()))?;
    }

    let account = state
        .wallet
        .connect()
        .await
        .map_err(|e| RpcError::from(MarketError::external("wallet", e)))?;
    *state.session.write().await = Some(account.clone());
    info!(account = %account.short(), "wallet connected");

    Ok(serde_json::json!({ "address": account }))
}

pub async fn disconnect_wallet(state: &Arc<DaemonState>) -> Result {
    let previous = state.session.write().await.take();
    if let Some(account) = &previous {
        info!(account = %account.short(), "wallet disconnected");
    }
    Ok(serde_json::json!({ "disconnected": previous.is_some() }))
}

/// Address, balance and network of the connected wallet.
pub async fn get_wallet_info(state: &Arc<DaemonState>) -> Result {
    let account = connected_account(state).await?;
    let summary = state.market.wallet_summary().await?;
    let role = match &state.dev_chain {
        Some(chain) => chain.role_of(&account).ok(),
        None => None,
    };

    Ok(serde_json::json!({
        "address": summary.address,
        "balance": summary.balance,
        "network": summary.network,
        "role": role,
    }))
}

pub async fn assign_role(state: &Arc<DaemonState>, params: &Value) -> Result {
    connected_account(state).await?;
    let address = Address::new(str_param(params, "address")?);
    let role: Role = str_param(params, "role")?
        .parse()
        .map_err(|e: medchain_types::TypesError| RpcError::invalid_params(&e.to_string()))?;

    let handle = state.market.assign_role(&address, role).await?;
    Ok(serde_json::json!({ "txHash": handle.hash }))
}
