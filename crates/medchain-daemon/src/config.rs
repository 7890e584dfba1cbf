//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use medchain_market::upload::{DEFAULT_EXTENSIONS, DEFAULT_MAX_BYTES};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Network the wallet reports.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Marketplace settings.
    #[serde(default)]
    pub market: MarketConfig,
    /// Upload admission.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Local development chain.
    #[serde(default)]
    pub dev: DevConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Origin the key-value store is scoped to. Clients sharing an origin
    /// see each other's registry and purchases.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Content store path. Empty = $data_dir/content/.
    #[serde(default)]
    pub content_path: String,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_name")]
    pub name: String,
    /// Numeric network id.
    #[serde(default = "default_network_chain_id")]
    pub chain_id: u64,
}

/// Marketplace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Paid for direct purchases when no uploader can be resolved.
    /// Empty = no fallback.
    #[serde(default)]
    pub fallback_recipient: String,
    /// Lowest display price, in thousandths of an ether.
    #[serde(default = "default_price_min")]
    pub price_min_milli_ether: u64,
    /// Highest display price, in thousandths of an ether.
    #[serde(default = "default_price_max")]
    pub price_max_milli_ether: u64,
    /// Upper bound of the download count shown per document.
    #[serde(default = "default_max_downloads")]
    pub max_downloads: u32,
}

/// Upload admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

/// Local development chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Funded accounts. The first half are patients, the rest researchers.
    #[serde(default = "default_account_count")]
    pub account_count: usize,
    /// Starting balance per account, in ether.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: String,
    /// Price the registry contract charges for access, in ether.
    #[serde(default = "default_access_price")]
    pub access_price: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
}

// Default value functions

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_network_name() -> String {
    "Localhost".to_string()
}

fn default_network_chain_id() -> u64 {
    1337
}

fn default_price_min() -> u64 {
    10
}

fn default_price_max() -> u64 {
    200
}

fn default_max_downloads() -> u32 {
    50
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_account_count() -> usize {
    10
}

fn default_initial_balance() -> String {
    "100".to_string()
}

fn default_access_price() -> String {
    "0.05".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            origin: default_origin(),
            content_path: String::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            chain_id: default_network_chain_id(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fallback_recipient: String::new(),
            price_min_milli_ether: default_price_min(),
            price_max_milli_ether: default_price_max(),
            max_downloads: default_max_downloads(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_extensions(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            account_count: default_account_count(),
            initial_balance: default_initial_balance(),
            access_price: default_access_price(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the content store directory.
    pub fn content_dir(&self) -> PathBuf {
        if self.storage.content_path.is_empty() {
            self.data_dir().join("content")
        } else {
            PathBuf::from(&self.storage.content_path)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("MEDCHAIN_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Medchain")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Medchain")
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs_fallback(".medchain")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/medchain"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.storage.origin, "http://localhost:8080");
        assert_eq!(config.network.chain_id, 1337);
        assert_eq!(config.market.price_min_milli_ether, 10);
        assert_eq!(config.market.price_max_milli_ether, 200);
        assert_eq!(config.upload.max_file_bytes, 10 * 1024 * 1024);
        assert!(config.upload.allowed_extensions.contains(&"docx".to_string()));
        assert_eq!(config.dev.account_count, 10);
        assert_eq!(config.advanced.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.storage.origin, config.storage.origin);
        assert_eq!(parsed.upload.allowed_extensions, config.upload.allowed_extensions);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let parsed: DaemonConfig = toml::from_str(
            r#"
            [market]
            fallback_recipient = "0x1234567890123456789012345678901234567890"

            [network]
            name = "Sepolia"
            "#,
        )
        .expect("parse");
        assert_eq!(
            parsed.market.fallback_recipient,
            "0x1234567890123456789012345678901234567890"
        );
        assert_eq!(parsed.market.max_downloads, 50);
        assert_eq!(parsed.network.name, "Sepolia");
        assert_eq!(parsed.network.chain_id, 1337);
        assert_eq!(parsed.dev.initial_balance, "100");
    }

    #[test]
    fn test_explicit_paths() {
        let mut config = DaemonConfig::default();
        config.storage.data_dir = "/var/lib/medchain".into();
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/medchain"));
        assert_eq!(config.content_dir(), PathBuf::from("/var/lib/medchain/content"));

        config.storage.content_path = "/mnt/content".into();
        assert_eq!(config.content_dir(), PathBuf::from("/mnt/content"));
    }
}
