//! Error types for the encryption layer.

use pagecrypt_keyring::KeyringError;
use pagecrypt_types::LayoutError;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while resolving keys or transforming pages and blocks.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The keyring has no key under the requested name or version.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Ciphertext could not be turned back into plaintext.
    #[error("decryption failed: {0}")]
    DecryptFailed(String),

    /// Plaintext could not be encrypted.
    #[error("encryption failed: {0}")]
    EncryptFailed(String),

    /// The context cannot perform this operation (no mode, no key).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Stored and computed checksums differ.
    #[error("checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The encryption info blob carries an unknown magic.
    #[error("unsupported encryption info version")]
    UnsupportedVersion,

    /// Key material of the wrong size.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Keyring backend failure other than a miss.
    #[error("keyring error: {0}")]
    Keyring(#[from] KeyringError),

    /// Buffer is not a valid page or log block.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CryptoError {
    /// True for misses that a caller may resolve by creating the key.
    #[must_use]
    pub fn is_key_not_found(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound(_) | Self::Keyring(KeyringError::NotFound(_))
        )
    }

    /// True if stored data failed an integrity check.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. } | Self::DecryptFailed(_))
    }
}
