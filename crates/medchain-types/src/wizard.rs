//! Registration wizard stages and form input.

use serde::{Deserialize, Serialize};

use crate::DocumentRecord;

/// Stage of the patient registration flow. Stages only move forward,
/// except for an explicit restart back to `Register`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    #[default]
    Register,
    Hash,
    Upload,
    Verify,
    Success,
}

impl WizardStage {
    pub fn as_str(self) -> &'static str {
        match self {
            WizardStage::Register => "register",
            WizardStage::Hash => "hash",
            WizardStage::Upload => "upload",
            WizardStage::Verify => "verify",
            WizardStage::Success => "success",
        }
    }
}

impl std::fmt::Display for WizardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields collected at the `Register` stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub product_name: String,
    pub description: String,
    pub category: String,
}

/// Read-only view of a wizard, as reported to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub stage: WizardStage,
    pub form: RegistrationForm,
    pub generated_hash: Option<String>,
    pub entered_hash: Option<String>,
    pub uploaded_documents: Vec<DocumentRecord>,
}
