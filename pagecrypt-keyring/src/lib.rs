//! Keyring client contract for pagecrypt.
//!
//! The encryption layer never stores secrets itself. Every key it uses is
//! generated, fetched and removed by name through [`Keyring`]. Backends own
//! the secret material; callers receive it wrapped in [`Zeroizing`] so it is
//! wiped once dropped.
//!
//! Names under [`SYSTEM_KEY_PREFIX`] are *system keys*: the keyring versions
//! them itself. Generating an existing system key adds a new version, fetching
//! the bare name returns `"<version>:<key bytes>"`, and fetching
//! `"<name>:<version>"` returns the raw bytes of that version.

mod memory;

pub use memory::MemoryKeyring;
pub use zeroize::Zeroizing;

use thiserror::Error;

/// Prefix of keyring-versioned system keys.
pub const SYSTEM_KEY_PREFIX: &str = "percona_";

/// The only key algorithm the encryption layer requests.
pub const ALGORITHM_AES: &str = "AES";

/// Errors returned by a keyring backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyringError {
    /// No secret is stored under the name.
    #[error("key not found in keyring: {0}")]
    NotFound(String),

    /// A non-system key with this name already exists.
    #[error("key already exists in keyring: {0}")]
    AlreadyExists(String),

    /// The backend is not loaded or not answering.
    #[error("keyring unavailable")]
    Unavailable,

    /// The backend cannot generate keys of this algorithm.
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A system key value did not have the `<version>:<key>` shape.
    #[error("malformed system key {0}")]
    Malformed(String),
}

pub type KeyringResult<T> = Result<T, KeyringError>;

/// Narrow generate/fetch/remove contract against an external secret store.
///
/// Calls are synchronous and carry no timeout or retry; a miss is reported
/// as [`KeyringError::NotFound`].
pub trait Keyring: Send + Sync {
    /// Creates a random secret of `key_len` bytes under `name`.
    fn generate(&self, name: &str, algorithm: &str, key_len: usize) -> KeyringResult<()>;

    /// Returns the secret stored under `name`.
    fn fetch(&self, name: &str) -> KeyringResult<Zeroizing<Vec<u8>>>;

    /// Deletes the secret stored under `name`.
    fn remove(&self, name: &str) -> KeyringResult<()>;
}

/// True if `name` is versioned by the keyring.
#[must_use]
pub fn is_system_key(name: &str) -> bool {
    name.starts_with(SYSTEM_KEY_PREFIX)
}

/// Splits `"<name>:<version>"` into its parts.
///
/// Returns `None` if the name carries no numeric version suffix.
#[must_use]
pub fn split_versioned_name(name: &str) -> Option<(&str, u32)> {
    let (base, version) = name.rsplit_once(':')?;
    let version = version.parse().ok()?;
    Some((base, version))
}

/// Parses a system key value of the form `"<version>:<key bytes>"`.
pub fn parse_system_key(value: &[u8]) -> KeyringResult<(u32, &[u8])> {
    let colon = value
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| KeyringError::Malformed("missing version separator".into()))?;
    let version = std::str::from_utf8(&value[..colon])
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| KeyringError::Malformed("version is not a number".into()))?;
    Ok((version, &value[colon + 1..]))
}

/// Formats a system key value the way [`parse_system_key`] reads it.
#[must_use]
pub fn format_system_key(version: u32, key: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut value = Zeroizing::new(Vec::with_capacity(key.len() + 11));
    value.extend_from_slice(version.to_string().as_bytes());
    value.push(b':');
    value.extend_from_slice(key);
    value
}
