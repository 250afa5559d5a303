//! Owned key material.
//!
//! Every key the layer handles is an [`EncryptionKey`]: a fixed 32-byte
//! buffer wiped on drop. Contexts and caches share keys through `Arc`, so a
//! key has exactly one release path.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every key and iv in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Block size of the AES primitive.
pub const AES_BLOCK_SIZE: usize = 16;

/// A versioned AES-256 key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
    #[zeroize(skip)]
    id: u32,
    #[zeroize(skip)]
    version: u32,
    #[zeroize(skip)]
    uuid: String,
}

impl EncryptionKey {
    /// Wraps raw key bytes with no id, version or owner.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes,
            id: 0,
            version: 0,
            uuid: String::new(),
        }
    }

    /// Copies key bytes out of a keyring value, checking the length.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Sets the master key id.
    #[must_use]
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// Sets the keyring key version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the owning server uuid.
    #[must_use]
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Returns the master key id, 0 if unset.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the keyring key version, 0 if unset.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Server uuid that owns the key; empty for bootstrap keys.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("uuid", &self.uuid)
            .finish()
    }
}

/// Generates a random tablespace key.
#[must_use]
pub fn generate_random_key() -> EncryptionKey {
    let mut bytes = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let key = EncryptionKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

/// Generates a random 32-byte iv. Only the first 16 bytes feed the cipher.
#[must_use]
pub fn generate_random_iv() -> [u8; KEY_LEN] {
    let mut iv = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// The fixed master key used before any keyring master key exists.
#[must_use]
pub fn default_master_key() -> EncryptionKey {
    let mut bytes = [0u8; KEY_LEN];
    let default = crate::names::DEFAULT_MASTER_KEY.as_bytes();
    bytes[..default.len()].copy_from_slice(default);
    EncryptionKey::from_bytes(bytes)
}
