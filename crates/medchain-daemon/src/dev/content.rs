//! Content-addressed storage on the local filesystem.
//!
//! Bytes are written to `<root>/<cid>` where the CID is a CIDv1 in base16
//! with a BLAKE3 multihash, so identical uploads share one file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use medchain_market::providers::{ProviderError, ProviderResult, StorageProvider, StoredContent};
use medchain_types::document::is_content_identifier;

/// CIDv1 prefix: multibase `f`, version 1, raw codec, BLAKE3-256 multihash.
const CID_PREFIX: &str = "f01551e20";

const PINS_FILE: &str = "pins";

pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content identifier for `bytes`.
    pub fn content_id(bytes: &[u8]) -> String {
        format!("{CID_PREFIX}{}", blake3::hash(bytes).to_hex())
    }

    /// Hashes are used as file names; only well-formed identifiers are
    /// accepted.
    fn path_for(&self, hash: &str) -> ProviderResult<PathBuf> {
        if !is_content_identifier(hash) || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ProviderError::Other(format!("invalid content id '{hash}'")));
        }
        Ok(self.root.join(hash))
    }

    pub async fn pinned(&self) -> ProviderResult<Vec<String>> {
        match tokio::fs::read_to_string(self.root.join(PINS_FILE)).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(e)),
        }
    }
}

fn io_error(e: std::io::Error) -> ProviderError {
    ProviderError::Other(format!("content store: {e}"))
}

#[async_trait]
impl StorageProvider for LocalContentStore {
    async fn upload(&self, bytes: &[u8], filename: &str) -> ProviderResult<StoredContent> {
        let hash = Self::content_id(bytes);
        let path = self.path_for(&hash)?;
        tokio::fs::create_dir_all(&self.root).await.map_err(io_error)?;
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;
        debug!(filename, hash = %hash, size = bytes.len(), "content written");
        Ok(StoredContent {
            url: format!("file://{}", path.display()),
            hash,
        })
    }

    async fn retrieve(&self, hash: &str) -> ProviderResult<Vec<u8>> {
        let path = self.path_for(hash)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProviderError::Other(format!("content {hash} not found")))
            }
            Err(e) => Err(io_error(e)),
        }
    }

    async fn pin(&self, hash: &str) -> ProviderResult<()> {
        let path = self.path_for(hash)?;
        if !tokio::fs::try_exists(&path).await.map_err(io_error)? {
            return Err(ProviderError::Other(format!("content {hash} not found")));
        }
        let mut pins = self.pinned().await?;
        if !pins.iter().any(|p| p == hash) {
            pins.push(hash.to_string());
            let mut content = pins.join("\n");
            content.push('\n');
            tokio::fs::write(self.root.join(PINS_FILE), content)
                .await
                .map_err(io_error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "medchain-content-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        root
    }

    #[test]
    fn test_content_id_is_well_formed() {
        let id = LocalContentStore::content_id(b"hello");
        assert!(id.starts_with(CID_PREFIX));
        assert!(is_content_identifier(&id));
        assert_eq!(id, LocalContentStore::content_id(b"hello"));
        assert_ne!(id, LocalContentStore::content_id(b"hello!"));
    }

    #[tokio::test]
    async fn test_upload_retrieve_pin() {
        let root = temp_root("roundtrip");
        let store = LocalContentStore::new(&root);

        let stored = store.upload(b"scan bytes", "scan.png").await.expect("upload");
        assert!(stored.url.starts_with("file://"));
        assert_eq!(store.retrieve(&stored.hash).await.expect("retrieve"), b"scan bytes");

        store.pin(&stored.hash).await.expect("pin");
        store.pin(&stored.hash).await.expect("pin again");
        assert_eq!(store.pinned().await.expect("pins"), vec![stored.hash.clone()]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_rejects_path_like_hashes() {
        let store = LocalContentStore::new(temp_root("reject"));
        assert!(store.retrieve("../etc/passwd").await.is_err());
        assert!(store.pin("QmShort").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_content() {
        let root = temp_root("missing");
        let store = LocalContentStore::new(&root);
        let id = LocalContentStore::content_id(b"never stored");
        assert!(matches!(store.retrieve(&id).await, Err(ProviderError::Other(_))));
    }
}
