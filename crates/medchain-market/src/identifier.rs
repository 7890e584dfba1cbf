//! Registration hash shown to the patient at the `Hash` stage.
//!
//! The value only has to be reproducible from the form and the moment of
//! submission so the patient can copy and re-enter it. It is not a
//! commitment to the uploaded content and must not be used as one.

use medchain_types::{RegistrationForm, IDENTIFIER_LEN};

/// Derive the registration hash: `0x` followed by 64 hex digits.
pub fn registration_hash(form: &RegistrationForm, now_ms: u64) -> String {
    let input = format!(
        "{}{}{}{}",
        form.product_name, form.description, form.category, now_ms
    );
    let digest = blake3::hash(input.as_bytes());
    format!("0x{}", hex::encode(&digest.as_bytes()[..IDENTIFIER_LEN]))
}
