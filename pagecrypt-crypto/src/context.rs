//! Per-tablespace and per-log encryption state.

use crate::cache::KeyVersionCache;
use crate::error::{CryptoError, CryptoResult};
use crate::hierarchy::KeyHierarchy;
use crate::info::{INFO_SIZE, encode_info};
use crate::key::{EncryptionKey, KEY_LEN};
use pagecrypt_types::layout::FIL_PAGE_TYPE;
use pagecrypt_types::{EncryptionMode, LogBlockView, PageType, RotationMode};
use std::sync::Arc;

/// Session state used by the page and log block codecs.
///
/// Cloning copies the scalar fields and re-shares the key and the
/// key-version cache.
#[derive(Clone, Default)]
pub struct EncryptionContext {
    mode: EncryptionMode,
    key: Option<Arc<EncryptionKey>>,
    iv: Option<[u8; KEY_LEN]>,
    key_version: u32,
    key_id: u32,
    key_id_uuid: String,
    rotation: RotationMode,
    checksum: u32,
    key_versions_cache: Option<Arc<KeyVersionCache>>,
}

impl EncryptionContext {
    /// Creates an empty context in `mode`.
    #[must_use]
    pub fn new(mode: EncryptionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Context for master-key encryption with a tablespace key and iv.
    #[must_use]
    pub fn aes(key: EncryptionKey, iv: [u8; KEY_LEN]) -> Self {
        Self {
            mode: EncryptionMode::Aes,
            key: Some(Arc::new(key)),
            iv: Some(iv),
            ..Self::default()
        }
    }

    /// Context for keyring encryption. The key's version and uuid are taken
    /// from the key itself.
    #[must_use]
    pub fn keyring(key: Arc<EncryptionKey>, key_id: u32, iv: [u8; KEY_LEN]) -> Self {
        Self {
            mode: EncryptionMode::Keyring,
            key_version: key.version(),
            key_id,
            key_id_uuid: key.uuid().to_string(),
            key: Some(key),
            iv: Some(iv),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EncryptionMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn key(&self) -> Option<&Arc<EncryptionKey>> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Option<Arc<EncryptionKey>>) {
        self.key = key;
    }

    #[must_use]
    pub fn iv(&self) -> Option<&[u8; KEY_LEN]> {
        self.iv.as_ref()
    }

    pub fn set_iv(&mut self, iv: Option<[u8; KEY_LEN]>) {
        self.iv = iv;
    }

    #[must_use]
    pub fn key_version(&self) -> u32 {
        self.key_version
    }

    pub fn set_key_version(&mut self, version: u32) {
        self.key_version = version;
    }

    #[must_use]
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn set_key_id(&mut self, key_id: u32) {
        self.key_id = key_id;
    }

    #[must_use]
    pub fn key_id_uuid(&self) -> &str {
        &self.key_id_uuid
    }

    pub fn set_key_id_uuid(&mut self, uuid: impl Into<String>) {
        self.key_id_uuid = uuid.into();
    }

    #[must_use]
    pub fn rotation(&self) -> RotationMode {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: RotationMode) {
        self.rotation = rotation;
    }

    /// Post-encryption checksum computed by the last page encryption.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn set_checksum(&mut self, checksum: u32) {
        self.checksum = checksum;
    }

    #[must_use]
    pub fn key_versions_cache(&self) -> Option<&Arc<KeyVersionCache>> {
        self.key_versions_cache.as_ref()
    }

    pub fn set_key_versions_cache(&mut self, cache: Option<Arc<KeyVersionCache>>) {
        self.key_versions_cache = cache;
    }

    /// Looks up a historical key version in the shared cache.
    #[must_use]
    pub fn cached_key(&self, version: u32) -> Option<Arc<EncryptionKey>> {
        self.key_versions_cache.as_ref()?.get(version)
    }

    /// True if the page type field holds one of the encrypted markers.
    #[must_use]
    pub fn is_encrypted_page(page: &[u8]) -> bool {
        page.get(FIL_PAGE_TYPE..FIL_PAGE_TYPE + 2)
            .map(|raw| PageType::from_u16(u16::from_be_bytes([raw[0], raw[1]])).is_encrypted())
            .unwrap_or(false)
    }

    /// True if the redo log block has its encrypted bit set.
    #[must_use]
    pub fn is_encrypted_log(block: &[u8]) -> bool {
        LogBlockView::new(block)
            .map(|view| view.is_encrypted())
            .unwrap_or(false)
    }

    /// Space headers, extent descriptors and R-tree pages are read before
    /// keyring keys are available and stay plaintext.
    #[must_use]
    pub fn can_be_keyring_encrypted(page_type: PageType) -> bool {
        !page_type.is_bootstrap_plaintext()
    }

    /// Key and iv, or `Unsupported` if the context cannot cipher.
    pub(crate) fn require_key_iv(&self) -> CryptoResult<(&Arc<EncryptionKey>, &[u8; KEY_LEN])> {
        if !self.mode.is_active() {
            return Err(CryptoError::Unsupported(
                "encryption context has no cipher mode".into(),
            ));
        }
        match (&self.key, &self.iv) {
            (Some(key), Some(iv)) => Ok((key, iv)),
            _ => Err(CryptoError::Unsupported(format!(
                "{} context has no key or iv",
                self.mode
            ))),
        }
    }

    /// Encodes the key and iv as a plaintext V3 blob for export.
    pub fn export_info(&self, hierarchy: &KeyHierarchy) -> CryptoResult<[u8; INFO_SIZE]> {
        let (key, iv) = self.require_key_iv()?;
        encode_info(hierarchy, key, iv, false, false)
    }

    /// Drops key material and returns the context to mode `None`.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("mode", &self.mode)
            .field("key", &self.key)
            .field("iv", &self.iv.map(|_| "[REDACTED]"))
            .field("key_version", &self.key_version)
            .field("key_id", &self.key_id)
            .field("key_id_uuid", &self.key_id_uuid)
            .field("rotation", &self.rotation)
            .field("checksum", &self.checksum)
            .field(
                "cached_versions",
                &self.key_versions_cache.as_ref().map(|c| c.len()),
            )
            .finish()
    }
}
