//! Integration test: patient registration wizard.
//!
//! 1. Register "Blood Panel" and receive the generated hash H1
//! 2. Continue to upload and upload one admitted file
//! 3. Verify with a wrong hash, then with H1
//! 4. Restart and check the registry kept the upload
//!
//! The registry lives in an on-disk SQLite store so a second client on the
//! same origin sees the upload without sharing any in-process state.

use std::sync::Arc;

use medchain_db::SqliteStore;
use medchain_market::registry::DocumentRegistry;
use medchain_market::testing::{MockContract, MockStorage, TestEnv};
use medchain_market::upload::UploadPolicy;
use medchain_market::wizard::RegistrationWizard;
use medchain_market::MarketError;
use medchain_types::{Address, RegistrationForm, WizardStage};

const ORIGIN: &str = "http://localhost:8080";
const PATIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
const TEST_TIMESTAMP_MS: u64 = 1_700_000_000_000;

fn form() -> RegistrationForm {
    RegistrationForm {
        product_name: "Blood Panel".into(),
        description: "desc".into(),
        category: "Lab".into(),
    }
}

#[tokio::test]
async fn register_upload_verify_restart() {
    let db_path = std::env::temp_dir().join(format!(
        "medchain-registration-flow-{}.db",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&db_path);

    let mut env = TestEnv::with_parts(MockStorage::new(), MockContract::new());
    env.collaborators.store = Arc::new(SqliteStore::open(&db_path, ORIGIN).expect("open store"));

    let mut wizard = RegistrationWizard::new(&env.collaborators);
    let patient = Address::new(PATIENT);

    // Step 1
    let h1 = wizard
        .submit_registration(form(), TEST_TIMESTAMP_MS)
        .expect("submit");
    assert!(h1.starts_with("0x"));
    assert_eq!(h1.len(), 66);
    assert_eq!(wizard.stage(), WizardStage::Hash);

    // Step 2
    wizard.continue_to_upload().expect("continue");
    let file = UploadPolicy::default()
        .admit("blood-panel.pdf", b"%PDF-1.4 results".to_vec())
        .expect("admit");
    let record = wizard
        .upload(file, &patient, TEST_TIMESTAMP_MS / 1000)
        .await
        .expect("upload");
    let s1 = record.storage_hash.clone().expect("storage hash");
    assert_eq!(wizard.stage(), WizardStage::Verify);

    // Step 3
    let err = wizard.verify("0xnot-the-hash", 0).expect_err("mismatch");
    assert!(matches!(err, MarketError::HashMismatch));
    assert_eq!(wizard.stage(), WizardStage::Verify);
    wizard.verify(&h1, 0).expect("verify");
    assert_eq!(wizard.stage(), WizardStage::Success);

    // Step 4
    wizard.restart();
    let snapshot = wizard.snapshot();
    assert_eq!(snapshot.stage, WizardStage::Register);
    assert!(snapshot.form.product_name.is_empty());
    assert!(snapshot.generated_hash.is_none());

    let other_client = DocumentRegistry::new(Arc::new(
        SqliteStore::open(&db_path, ORIGIN).expect("open second handle"),
    ));
    let documents = other_client.list_documents().expect("list");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].storage_hash.as_deref(), Some(s1.as_str()));
    assert_eq!(documents[0].owner.as_ref(), Some(&patient));
    assert!(documents[0].is_verified());

    drop(other_client);
    drop(wizard);
    drop(env);
    let _ = std::fs::remove_file(&db_path);
    let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
    let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
}

#[tokio::test]
async fn empty_product_name_stays_on_register() {
    let env = TestEnv::new();
    let mut wizard = RegistrationWizard::new(&env.collaborators);
    let err = wizard
        .submit_registration(
            RegistrationForm {
                product_name: String::new(),
                ..form()
            },
            TEST_TIMESTAMP_MS,
        )
        .expect_err("must fail");
    assert!(matches!(err, MarketError::Validation(_)));
    assert_eq!(wizard.stage(), WizardStage::Register);
    assert!(wizard.generated_hash().is_none());
}

#[tokio::test]
async fn storage_outage_keeps_wizard_on_upload() {
    let env = TestEnv::with_parts(MockStorage::unavailable(), MockContract::new());
    let mut wizard = RegistrationWizard::new(&env.collaborators);
    wizard
        .submit_registration(form(), TEST_TIMESTAMP_MS)
        .expect("submit");
    wizard.continue_to_upload().expect("continue");

    let file = UploadPolicy::default()
        .admit("scan.png", vec![1u8; 64])
        .expect("admit");
    let err = wizard
        .upload(file.clone(), &Address::new(PATIENT), 1)
        .await
        .expect_err("must fail");
    assert!(matches!(err, MarketError::ExternalUnavailable { .. }));
    assert_eq!(wizard.stage(), WizardStage::Upload);
    assert!(env.registry().list_documents().expect("list").is_empty());

    // The user re-triggers once storage is back.
    env.storage.set_available(true);
    wizard
        .upload(file, &Address::new(PATIENT), 2)
        .await
        .expect("upload");
    assert_eq!(wizard.stage(), WizardStage::Verify);
    assert_eq!(env.registry().list_documents().expect("list").len(), 1);
}
