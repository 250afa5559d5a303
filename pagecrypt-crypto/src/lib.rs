//! Key hierarchy and block encryption for pagecrypt.
//!
//! This crate provides:
//! - [`KeyHierarchy`]: master, tablespace and redo log keys resolved through
//!   a [`pagecrypt_keyring::Keyring`]
//! - [`EncryptionContext`]: per-tablespace or per-log cipher state
//! - Encryption info blobs that persist a wrapped key and iv
//! - [`PageCodec`] for data pages and the redo log block functions
//!
//! Keys are AES-256 and wiped from memory on drop.

mod cache;
pub mod cipher;
mod config;
mod context;
mod error;
mod hierarchy;
pub mod info;
mod key;
mod log;
pub mod names;
mod page;

pub use cache::KeyVersionCache;
pub use config::EncryptionConfig;
pub use context::EncryptionContext;
pub use error::{CryptoError, CryptoResult};
pub use hierarchy::{DEFAULT_MASTER_KEY_ID, KeyHierarchy};
pub use info::{
    DecodedInfo, INFO_MAX_SIZE, INFO_SIZE, InfoHeader, InfoVersion, RotationInfo,
    TablespaceKeyInfo, decode_context, decode_info, encode_info, encode_rotation_info,
};
pub use key::{
    AES_BLOCK_SIZE, EncryptionKey, KEY_LEN, default_master_key, generate_random_iv,
    generate_random_key,
};
pub use log::{decrypt_log, decrypt_log_block, encrypt_log, encrypt_log_block, recover_key_version};
pub use page::{MIN_ENCRYPTION_LEN, PageCodec, page_crc32};
