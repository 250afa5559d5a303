//! On-disk layout types for pagecrypt.
//!
//! This crate defines the byte-exact structures that the encryption layer
//! transforms:
//! - Data page header offsets and the closed set of page types
//! - Bounds-checked page views over fixed-size buffers
//! - Redo log block views (header, payload, trailer checksum)
//! - Encryption and rotation modes carried by an encryption context
//!
//! Nothing here touches key material; the crypto crate builds on these views.

pub mod layout;
mod log_block;
mod mode;
mod page;
mod page_type;

pub use log_block::{LogBlockView, LogBlockViewMut};
pub use mode::{EncryptionMode, RotationMode};
pub use page::{PageView, PageViewMut};
pub use page_type::PageType;

/// Result type alias using the crate's error type.
pub type LayoutResult<T> = std::result::Result<T, LayoutError>;

/// Errors raised when a buffer cannot be viewed as a page or log block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("page buffer too small: {len} bytes, need at least {min}")]
    PageTooSmall { len: usize, min: usize },

    #[error("page buffer too large: {len} bytes, at most {max} allowed")]
    PageTooLarge { len: usize, max: usize },

    #[error("page size {len} is not a power of two")]
    PageSizeNotPowerOfTwo { len: usize },

    #[error("log block must be exactly {expected} bytes, got {actual}")]
    LogBlockSize { expected: usize, actual: usize },

    #[error("unknown encryption mode: {0}")]
    UnknownMode(String),
}
