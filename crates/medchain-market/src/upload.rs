//! File admission for the upload step.
//!
//! The wizard never sees a raw file: [`UploadPolicy::admit`] checks the
//! extension allow-list and size limit and is the only way to build an
//! [`UploadFile`].

use crate::{MarketError, Result};

/// Default accepted extensions.
pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "doc", "docx"];

/// Default size limit: 10 MB.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl UploadPolicy {
    pub fn new(allowed_extensions: &[String], max_bytes: u64) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_bytes,
        }
    }

    /// Accept a single file for upload.
    pub fn admit(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadFile> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(MarketError::Validation("file name is required".into()));
        }
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(MarketError::Validation(format!(
                "unsupported file type '{filename}', expected one of: {}",
                self.allowed_extensions.join(", ")
            )));
        }
        if bytes.is_empty() {
            return Err(MarketError::Validation(format!("'{filename}' is empty")));
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(MarketError::Validation(format!(
                "'{filename}' is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }
        Ok(UploadFile {
            filename: filename.to_string(),
            bytes,
        })
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        let extensions: Vec<String> = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        Self::new(&extensions, DEFAULT_MAX_BYTES)
    }
}

/// A file that passed the [`UploadPolicy`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    filename: String,
    bytes: Vec<u8>,
}

impl UploadFile {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
