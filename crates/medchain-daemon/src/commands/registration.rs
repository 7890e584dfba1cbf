//! Registration wizard command handlers.
//!
//! Every handler takes the wizard through [`WizardHandle::acquire`], so a
//! call made while another is still running (typically a slow upload) fails
//! with `OPERATION_PENDING`.
//!
//! [`WizardHandle::acquire`]: medchain_market::wizard::WizardHandle::acquire

use std::sync::Arc;

use base64::Engine;
use serde_json::Value;

use medchain_types::RegistrationForm;

use super::{connected_account, str_param, unix_now, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

pub async fn get_wizard_state(state: &Arc<DaemonState>) -> Result {
    let wizard = state.wizard.acquire()?;
    serde_json::to_value(wizard.snapshot()).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Register → Hash.
pub async fn submit_registration(state: &Arc<DaemonState>, params: &Value) -> Result {
    let form: RegistrationForm = serde_json::from_value(params.clone())
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;

    let mut wizard = state.wizard.acquire()?;
    let now_ms = u64::try_from(unix_now().as_millis()).unwrap_or(u64::MAX);
    let hash = wizard.submit_registration(form, now_ms)?;

    Ok(serde_json::json!({
        "generatedHash": hash,
        "stage": wizard.stage(),
    }))
}

/// Text for the clipboard.
pub async fn copy_generated_hash(state: &Arc<DaemonState>) -> Result {
    let wizard = state.wizard.acquire()?;
    Ok(serde_json::json!({ "text": wizard.copy_hash()? }))
}

pub async fn continue_to_upload(state: &Arc<DaemonState>) -> Result {
    let mut wizard = state.wizard.acquire()?;
    wizard.continue_to_upload()?;
    Ok(serde_json::json!({ "stage": wizard.stage() }))
}

/// Upload → Verify. `content` is the file's bytes in standard base64.
pub async fn upload_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let filename = str_param(params, "filename")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(str_param(params, "content")?)
        .map_err(|_| RpcError::invalid_params("content must be base64"))?;
    let owner = connected_account(state).await?;

    let file = state.upload_policy.admit(filename, bytes)?;

    let mut wizard = state.wizard.acquire()?;
    let record = wizard.upload(file, &owner, unix_now().as_secs()).await?;

    Ok(serde_json::json!({
        "document": record,
        "stage": wizard.stage(),
    }))
}

/// Verify → Success when the re-entered hash matches.
pub async fn verify_generated_hash(state: &Arc<DaemonState>, params: &Value) -> Result {
    let entered = str_param(params, "hash")?;
    let mut wizard = state.wizard.acquire()?;
    wizard.verify(entered, unix_now().as_secs())?;
    Ok(serde_json::json!({ "stage": wizard.stage() }))
}

pub async fn restart_wizard(state: &Arc<DaemonState>) -> Result {
    let mut wizard = state.wizard.acquire()?;
    wizard.restart();
    Ok(serde_json::json!({ "stage": wizard.stage() }))
}

pub async fn return_home(state: &Arc<DaemonState>) -> Result {
    let mut wizard = state.wizard.acquire()?;
    let documents = wizard.return_home()?;
    Ok(serde_json::json!({
        "uploadedDocuments": documents,
        "stage": wizard.stage(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    fn encoded(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn test_full_wizard_over_rpc_handlers() {
        let (env, state) = test_support::connected_state().await;

        let submitted = submit_registration(
            &state,
            &serde_json::json!({
                "productName": "Blood Panel",
                "description": "CBC",
                "category": "Lab",
            }),
        )
        .await
        .expect("submit");
        assert_eq!(submitted["stage"], "hash");
        let hash = submitted["generatedHash"].as_str().expect("hash").to_string();

        let copied = copy_generated_hash(&state).await.expect("copy");
        assert_eq!(copied["text"], hash.as_str());

        continue_to_upload(&state).await.expect("continue");
        let uploaded = upload_document(
            &state,
            &serde_json::json!({ "filename": "panel.pdf", "content": encoded(b"%PDF-1.4") }),
        )
        .await
        .expect("upload");
        assert_eq!(uploaded["stage"], "verify");
        assert_eq!(env.registry().list_documents().expect("list").len(), 1);

        let err = verify_generated_hash(&state, &serde_json::json!({ "hash": "0xnope" }))
            .await
            .expect_err("mismatch");
        assert_eq!(err.code, -32021);

        let verified = verify_generated_hash(&state, &serde_json::json!({ "hash": hash }))
            .await
            .expect("verify");
        assert_eq!(verified["stage"], "success");

        let home = return_home(&state).await.expect("home");
        assert_eq!(home["uploadedDocuments"].as_array().expect("docs").len(), 1);
        assert_eq!(home["stage"], "register");
    }

    #[tokio::test]
    async fn test_empty_product_name() {
        let (_env, state) = test_support::connected_state().await;
        let err = submit_registration(
            &state,
            &serde_json::json!({ "productName": "", "description": "x" }),
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.code, -32020);

        let snapshot = get_wizard_state(&state).await.expect("state");
        assert_eq!(snapshot["stage"], "register");
    }

    #[tokio::test]
    async fn test_missing_fields_fail_validation() {
        let (_env, state) = test_support::connected_state().await;
        for params in [
            serde_json::json!({ "productName": "Blood Panel" }),
            serde_json::json!({ "description": "CBC" }),
        ] {
            let err = submit_registration(&state, &params)
                .await
                .expect_err("must fail");
            assert_eq!(err.code, -32020);
        }
        assert_eq!(get_wizard_state(&state).await.expect("state")["stage"], "register");
    }

    #[tokio::test]
    async fn test_rejected_file_type() {
        let (_env, state) = test_support::connected_state().await;
        submit_registration(
            &state,
            &serde_json::json!({ "productName": "Scan", "description": "x" }),
        )
        .await
        .expect("submit");
        continue_to_upload(&state).await.expect("continue");

        let err = upload_document(
            &state,
            &serde_json::json!({ "filename": "run.exe", "content": encoded(b"MZ") }),
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.code, -32020);
        assert_eq!(get_wizard_state(&state).await.expect("state")["stage"], "upload");
    }

    #[tokio::test]
    async fn test_upload_needs_wallet() {
        let (_env, state) = test_support::state();
        let err = upload_document(
            &state,
            &serde_json::json!({ "filename": "a.pdf", "content": encoded(b"x") }),
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.code, -32010);
    }

    #[tokio::test]
    async fn test_wrong_stage() {
        let (_env, state) = test_support::connected_state().await;
        let err = continue_to_upload(&state).await.expect_err("must fail");
        assert_eq!(err.code, -32022);
    }

    #[tokio::test]
    async fn test_pending_operation() {
        let (_env, state) = test_support::connected_state().await;
        let _guard = state.wizard.acquire().expect("hold");
        let err = restart_wizard(&state).await.expect_err("must fail");
        assert_eq!(err.code, -32023);
    }
}
