//! Encryption configuration, loaded from a TOML file.
//!
//! ```toml
//! server_uuid = "8a94f357-aab4-11df-86ab-c80aa9429562"
//! server_id = 1
//! page_size = 16384
//! fs_block_size = 512
//! ```

use crate::error::{CryptoError, CryptoResult};
use crate::info::SERVER_UUID_LEN;
use pagecrypt_types::layout::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Settings shared by the key hierarchy and the codecs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Identity of this server instance, embedded in key names and blobs.
    /// Empty until the server has generated one.
    pub server_uuid: String,
    /// Numeric server id used by the legacy master key template.
    pub server_id: u64,
    /// Physical page size in bytes.
    pub page_size: usize,
    /// Filesystem block size; version-1 compressed pages cipher a length
    /// aligned up to this.
    pub fs_block_size: usize,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            server_uuid: String::new(),
            server_id: 0,
            page_size: DEFAULT_PAGE_SIZE,
            fs_block_size: 512,
        }
    }
}

impl EncryptionConfig {
    /// Creates a configuration for `server_uuid` with default sizes.
    #[must_use]
    pub fn with_uuid(server_uuid: impl Into<String>) -> Self {
        Self {
            server_uuid: server_uuid.into(),
            ..Self::default()
        }
    }

    /// Reads and validates a TOML configuration file.
    pub fn load_from(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CryptoError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded encryption config from {:?}", path);
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> CryptoResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| CryptoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the uuid shape and the size constraints.
    pub fn validate(&self) -> CryptoResult<()> {
        if !self.server_uuid.is_empty() {
            uuid::Uuid::parse_str(&self.server_uuid).map_err(|e| {
                CryptoError::Config(format!("invalid server_uuid {:?}: {e}", self.server_uuid))
            })?;
            if self.server_uuid.len() != SERVER_UUID_LEN {
                return Err(CryptoError::Config(format!(
                    "server_uuid must use the {SERVER_UUID_LEN}-character hyphenated form"
                )));
            }
        }
        if !self.page_size.is_power_of_two()
            || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size)
        {
            return Err(CryptoError::Config(format!(
                "page_size must be a power of two between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if !self.fs_block_size.is_power_of_two() || self.fs_block_size > self.page_size {
            return Err(CryptoError::Config(format!(
                "fs_block_size must be a power of two no larger than page_size, got {}",
                self.fs_block_size
            )));
        }
        Ok(())
    }
}
