//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod history;
pub mod marketplace;
pub mod registration;
pub mod wallet;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;

use medchain_types::Address;

use crate::rpc::RpcError;
use crate::DaemonState;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Time since the Unix epoch.
pub(crate) fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// The session's connected account.
pub(crate) async fn connected_account(state: &DaemonState) -> std::result::Result<Address, RpcError> {
    state
        .session
        .read()
        .await
        .clone()
        .ok_or_else(RpcError::wallet_not_connected)
}

/// A required string parameter.
pub(crate) fn str_param<'a>(params: &'a Value, name: &str) -> std::result::Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}
