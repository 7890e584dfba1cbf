//! Transaction history command handlers.

use std::sync::Arc;

use serde_json::Value;

use medchain_market::transactions::parse_kind_filter;

use super::Result;
use crate::rpc::RpcError;
use crate::DaemonState;

/// Transactions, newest first.
///
/// Params (all optional): `search` over hash and description, and `kind`
/// (`"all"` by default).
pub async fn get_transaction_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let search = params.get("search").and_then(|v| v.as_str()).unwrap_or("");
    let kind = parse_kind_filter(params.get("kind").and_then(|v| v.as_str()).unwrap_or("all"))?;

    let txs = state.market.history(search, kind)?;
    serde_json::to_value(txs).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Status and payment totals over the whole history.
pub async fn get_transaction_summary(state: &Arc<DaemonState>) -> Result {
    let summary = state.market.history_summary()?;
    serde_json::to_value(summary).map_err(|e| RpcError::internal_error(&e.to_string()))
}
