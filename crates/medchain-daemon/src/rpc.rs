//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! line-delimited JSON-RPC 2.0 calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use medchain_market::MarketError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    fn with_detail(code: i32, message: &str, detail: &str) -> Self {
        Self::new(code, message, Some(serde_json::json!({ "detail": detail })))
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            -32601,
            "METHOD_NOT_FOUND",
            Some(serde_json::json!({ "method": method })),
        )
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::with_detail(-32603, "INTERNAL_ERROR", detail)
    }

    // Application errors

    /// No wallet connected for this session (-32010).
    pub fn wallet_not_connected() -> Self {
        Self::new(-32010, "WALLET_NOT_CONNECTED", None)
    }
}

impl From<MarketError> for RpcError {
    fn from(err: MarketError) -> Self {
        let detail = err.to_string();
        match err {
            MarketError::Validation(_) => Self::with_detail(-32020, "VALIDATION_FAILED", &detail),
            MarketError::HashMismatch => Self::with_detail(-32021, "HASH_MISMATCH", &detail),
            MarketError::InvalidStage { expected, actual } => Self::new(
                -32022,
                "INVALID_STAGE",
                Some(serde_json::json!({
                    "expected": expected,
                    "actual": actual,
                })),
            ),
            MarketError::OperationPending => Self::new(-32023, "OPERATION_PENDING", None),
            MarketError::ExternalUnavailable { service, detail } => Self::new(
                -32030,
                "EXTERNAL_UNAVAILABLE",
                Some(serde_json::json!({
                    "service": service,
                    "detail": detail,
                })),
            ),
            MarketError::Schema(_) => Self::with_detail(-32031, "SCHEMA_MISMATCH", &detail),
            MarketError::NoResolvableRecipient(_) => {
                Self::with_detail(-32040, "NO_RESOLVABLE_RECIPIENT", &detail)
            }
            MarketError::NotRegistered(_) => Self::with_detail(-32041, "NOT_REGISTERED", &detail),
            MarketError::DocumentNotFound(_) => {
                Self::with_detail(-32042, "DOCUMENT_NOT_FOUND", &detail)
            }
            MarketError::AccessDenied(_) => Self::with_detail(-32043, "ACCESS_DENIED", &detail),
            MarketError::Serialization(_) | MarketError::Store(_) => Self::internal_error(&detail),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, RpcError::invalid_request())
            }
            Ok(request) => dispatch_request(&state, request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: &Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Wallet
        "connect_wallet" => commands::wallet::connect_wallet(state, params).await,
        "disconnect_wallet" => commands::wallet::disconnect_wallet(state).await,
        "get_wallet_info" => commands::wallet::get_wallet_info(state).await,
        "assign_role" => commands::wallet::assign_role(state, params).await,

        // Registration wizard
        "get_wizard_state" => commands::registration::get_wizard_state(state).await,
        "submit_registration" => commands::registration::submit_registration(state, params).await,
        "copy_generated_hash" => commands::registration::copy_generated_hash(state).await,
        "continue_to_upload" => commands::registration::continue_to_upload(state).await,
        "upload_document" => commands::registration::upload_document(state, params).await,
        "verify_generated_hash" => {
            commands::registration::verify_generated_hash(state, params).await
        }
        "restart_wizard" => commands::registration::restart_wizard(state).await,
        "return_home" => commands::registration::return_home(state).await,

        // Marketplace
        "list_documents" => commands::marketplace::list_documents(state, params).await,
        "get_categories" => commands::marketplace::get_categories(state).await,
        "purchase_document" => commands::marketplace::purchase_document(state, params).await,
        "can_download" => commands::marketplace::can_download(state, params).await,
        "download_document" => commands::marketplace::download_document(state, params).await,
        "verify_document" => commands::marketplace::verify_document(state, params).await,

        // History
        "get_transaction_history" => {
            commands::history::get_transaction_history(state, params).await
        }
        "get_transaction_summary" => commands::history::get_transaction_summary(state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
