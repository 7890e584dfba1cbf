//! Marketplace command handlers.

use std::sync::Arc;

use base64::Engine;
use serde_json::Value;

use medchain_types::ALL_CATEGORIES;

use super::{connected_account, str_param, unix_now, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

fn to_json<T: serde::Serialize>(value: T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Search the registry.
///
/// Params (all optional): `search`, `category` (`"all"` by default) and
/// `purchasable_only`.
pub async fn list_documents(state: &Arc<DaemonState>, params: &Value) -> Result {
    let search = params.get("search").and_then(|v| v.as_str()).unwrap_or("");
    let category = params
        .get("category")
        .and_then(|v| v.as_str())
        .unwrap_or(ALL_CATEGORIES);
    let purchasable_only = params
        .get("purchasable_only")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    to_json(state.market.browse(search, category, purchasable_only)?)
}

pub async fn get_categories(state: &Arc<DaemonState>) -> Result {
    to_json(state.market.categories()?)
}

pub async fn purchase_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let storage_hash = str_param(params, "storage_hash")?;
    let buyer = connected_account(state).await?;
    let outcome = state
        .market
        .purchase(storage_hash, &buyer, unix_now().as_secs())
        .await?;
    to_json(outcome)
}

/// Whether the connected account may download. False when not connected.
pub async fn can_download(state: &Arc<DaemonState>, params: &Value) -> Result {
    let storage_hash = str_param(params, "storage_hash")?;
    let account = state.session.read().await.clone();
    let allowed = state.market.can_download(storage_hash, account.as_ref())?;
    Ok(serde_json::json!({ "canDownload": allowed }))
}

/// The document's bytes in standard base64.
pub async fn download_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let storage_hash = str_param(params, "storage_hash")?;
    let account = state.session.read().await.clone();
    let bytes = state.market.download(storage_hash, account.as_ref()).await?;
    Ok(serde_json::json!({
        "storageHash": storage_hash,
        "size": bytes.len(),
        "content": base64::engine::general_purpose::STANDARD.encode(&bytes),
    }))
}

/// Integrity check of a chain identifier against the registry contract.
pub async fn verify_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let chain_id = str_param(params, "chain_id")?;
    to_json(state.market.verify_document(chain_id).await?)
}
