//! Data page encryption.
//!
//! The 38-byte page header always stays plaintext. What follows depends on
//! the page and the mode:
//!
//! - Uncompressed, master-key mode: everything after the header is ciphered.
//! - Uncompressed, keyring mode: the last 4 bytes (low LSN word, a copy of
//!   header bytes 20..24) are left out and restored from the header on
//!   decrypt. The key version is stamped at offset 30.
//! - Transparently compressed: only the declared compressed payload is
//!   ciphered, extended to a minimum length, and the rest is zero padded. In
//!   keyring mode the ciphertext is shifted 8 bytes to make room for a
//!   checksum slot (38) and the key version (42).
//!
//! The type field is rewritten to one of the encrypted markers and restored
//! on decrypt.

use crate::cipher::{decrypt_region, encrypt_region, region_split};
use crate::config::EncryptionConfig;
use crate::context::EncryptionContext;
use crate::error::{CryptoError, CryptoResult};
use crate::key::AES_BLOCK_SIZE;
use byteorder::{BigEndian, ByteOrder};
use pagecrypt_types::layout::*;
use pagecrypt_types::{EncryptionMode, PageType, PageView, PageViewMut, RotationMode};
use tracing::{debug, error};

/// Smallest ciphered length of a compressed page, header included.
pub const MIN_ENCRYPTION_LEN: usize = 2 * AES_BLOCK_SIZE + FIL_PAGE_DATA;

/// Offset of the low LSN word in the header.
const FIL_PAGE_LSN_LOW: usize = FIL_PAGE_LSN + 4;

/// Byte ranges of one page transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    compressed: bool,
    /// Where ciphertext starts on disk.
    header_len: usize,
    /// Length of the ciphered region.
    data_len: usize,
}

impl Geometry {
    fn cipher_end(&self) -> usize {
        self.header_len + self.data_len
    }
}

/// InnoDB CRC-32C page checksum over `page`, skipping the checksum fields.
#[must_use]
pub fn page_crc32(page: &[u8]) -> u32 {
    let head = crc32c::crc32c(&page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let end = page.len().saturating_sub(FIL_PAGE_END_LSN_OLD_CHKSUM);
    let body = crc32c::crc32c(page.get(FIL_PAGE_DATA..end).unwrap_or_default());
    head ^ body
}

/// Encrypts and decrypts data pages.
///
/// A codec built from an [`EncryptionConfig`] only accepts pages of the
/// configured size. The default codec accepts any valid page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCodec {
    fs_block_size: usize,
    page_size: Option<usize>,
}

impl Default for PageCodec {
    fn default() -> Self {
        Self {
            fs_block_size: 512,
            page_size: None,
        }
    }
}

impl PageCodec {
    /// Creates a codec for the page and filesystem block sizes of `config`.
    #[must_use]
    pub fn new(config: &EncryptionConfig) -> Self {
        Self {
            fs_block_size: config.fs_block_size,
            page_size: Some(config.page_size),
        }
    }

    /// Creates a codec with a custom filesystem block size and no page size
    /// restriction.
    #[must_use]
    pub fn with_fs_block_size(fs_block_size: usize) -> Self {
        Self {
            fs_block_size,
            page_size: None,
        }
    }

    /// Restricts the codec to pages of exactly `page_size` bytes.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Returns the filesystem block size used by version-1 compression.
    #[must_use]
    pub fn fs_block_size(&self) -> usize {
        self.fs_block_size
    }

    /// Returns the accepted page size, if the codec is restricted to one.
    #[must_use]
    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    fn check_page_size(&self, len: usize) -> CryptoResult<()> {
        match self.page_size {
            Some(expected) if expected != len => Err(CryptoError::Unsupported(format!(
                "page is {len} bytes, configured page size is {expected}"
            ))),
            _ => Ok(()),
        }
    }

    /// Length of a compressed page that is ciphered, header included.
    fn compressed_cipher_len(&self, page: &PageView<'_>) -> CryptoResult<usize> {
        let declared = page.compressed_size() as usize + FIL_PAGE_DATA;
        let len = if page.compression_version() == COMPRESSION_VERSION_1 {
            declared.next_multiple_of(self.fs_block_size.max(1))
        } else {
            declared
        }
        .max(MIN_ENCRYPTION_LEN);
        if len > page.len() {
            return Err(CryptoError::Unsupported(format!(
                "compressed length {len} exceeds page size {}",
                page.len()
            )));
        }
        Ok(len)
    }

    fn geometry(
        &self,
        page: &PageView<'_>,
        compressed: bool,
        mode: EncryptionMode,
    ) -> CryptoResult<Geometry> {
        let keyring = mode == EncryptionMode::Keyring;
        let len = page.len();
        let geometry = if compressed {
            let enc_len = self.compressed_cipher_len(page)?;
            let header_len = if keyring {
                FIL_PAGE_DATA + KEYRING_COMPRESSED_FOOTPRINT
            } else {
                FIL_PAGE_DATA
            };
            Geometry {
                compressed,
                header_len,
                data_len: enc_len - FIL_PAGE_DATA,
            }
        } else if keyring {
            Geometry {
                compressed,
                header_len: FIL_PAGE_DATA,
                data_len: len - FIL_PAGE_DATA - 4,
            }
        } else {
            Geometry {
                compressed,
                header_len: FIL_PAGE_DATA,
                data_len: len - FIL_PAGE_DATA,
            }
        };
        if geometry.cipher_end() > len {
            return Err(CryptoError::Unsupported(format!(
                "ciphered region ends at {} past page size {len}",
                geometry.cipher_end()
            )));
        }
        region_split(geometry.data_len)?;
        Ok(geometry)
    }

    /// Encrypts `src` into `dst`.
    ///
    /// `src` is never modified and `dst` is only written once every check
    /// and the cipher itself have succeeded.
    pub fn encrypt(
        &self,
        ctx: &mut EncryptionContext,
        src: &[u8],
        dst: &mut [u8],
    ) -> CryptoResult<()> {
        let page = PageView::new(src)?;
        self.check_page_size(src.len())?;
        if dst.len() != src.len() {
            return Err(CryptoError::EncryptFailed(format!(
                "destination is {} bytes, page is {}",
                dst.len(),
                src.len()
            )));
        }
        if page.is_encrypted() {
            return Err(CryptoError::EncryptFailed("page is already encrypted".into()));
        }

        let (key, iv) = ctx.require_key_iv()?;
        let mode = ctx.mode();
        let keyring = mode == EncryptionMode::Keyring;
        if keyring && ctx.key_version() == 0 {
            return Err(CryptoError::Unsupported(
                "keyring encryption needs a key version".into(),
            ));
        }

        let page_type = page.page_type();
        let geometry = self.geometry(&page, page_type == PageType::Compressed, mode)?;

        let mut region = src[FIL_PAGE_DATA..FIL_PAGE_DATA + geometry.data_len].to_vec();
        encrypt_region(key.as_bytes(), iv, &mut region).inspect_err(|e| {
            error!(
                space_id = page.space_id(),
                page_no = page.page_no(),
                error = %e,
                "Can't encrypt data of page"
            );
        })?;

        let len = src.len();
        dst[..FIL_PAGE_DATA].copy_from_slice(&src[..FIL_PAGE_DATA]);
        dst[geometry.header_len..geometry.cipher_end()].copy_from_slice(&region);
        if geometry.compressed {
            dst[geometry.cipher_end()..].fill(0);
        } else if keyring {
            dst[len - 4..].copy_from_slice(&src[len - 4..]);
        }

        let mut out = PageViewMut::new(dst)?;
        match page_type {
            PageType::Compressed => out.set_page_type(PageType::CompressedAndEncrypted),
            PageType::Rtree => out.set_page_type(PageType::EncryptedRtree),
            other => {
                out.set_page_type(PageType::Encrypted);
                out.set_original_type(other.as_u16());
            }
        }

        if keyring {
            let version = ctx.key_version();
            ctx.set_checksum(0);
            if geometry.compressed {
                out.set_compressed_checksum(0);
                out.set_compressed_key_version(version);
            }
            if ctx.rotation() == RotationMode::MasterKeyToKeyring {
                let checksum = checksum_of(out.as_view().as_bytes(), geometry);
                ctx.set_checksum(checksum);
            }
            let checksum = ctx.checksum();
            if geometry.compressed {
                if checksum != 0 {
                    out.set_compressed_checksum(checksum);
                }
            } else {
                out.set_key_version(version);
                if checksum != 0 {
                    out.set_trailer_low_word(checksum);
                }
            }
        }

        debug!(
            space_id = page.space_id(),
            page_no = page.page_no(),
            %mode,
            "encrypted page"
        );
        Ok(())
    }

    /// Decrypts `page` in place.
    ///
    /// Returns `Ok(false)` if the page is not encrypted or the context has no
    /// cipher mode. An encrypted page with no usable key is an error, and the
    /// page is left untouched on any error.
    pub fn decrypt(&self, ctx: &EncryptionContext, page: &mut [u8]) -> CryptoResult<bool> {
        let view = PageView::new(page)?;
        self.check_page_size(page.len())?;
        let encrypted = view.is_encrypted();
        let mode = ctx.mode();

        if encrypted && !mode.is_active() {
            return Err(CryptoError::DecryptFailed(
                "page is encrypted but no encryption is configured".into(),
            ));
        }
        if !encrypted || !mode.is_active() {
            return Ok(false);
        }

        let page_type = view.page_type();
        let compressed = page_type == PageType::CompressedAndEncrypted;
        let keyring = mode == EncryptionMode::Keyring;
        let original_type = view.original_type();
        let geometry = self.geometry(&view, compressed, mode)?;

        let (current_key, iv) = ctx
            .require_key_iv()
            .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
        let key = if keyring {
            let stamped = if compressed {
                view.compressed_key_version()
            } else {
                view.key_version()
            };
            if stamped == ctx.key_version() {
                current_key.clone()
            } else {
                ctx.cached_key(stamped).ok_or_else(|| {
                    CryptoError::KeyNotFound(format!("page key version {stamped}"))
                })?
            }
        } else {
            current_key.clone()
        };

        let mut region = page[geometry.header_len..geometry.cipher_end()].to_vec();
        decrypt_region(key.as_bytes(), iv, &mut region).inspect_err(|e| {
            error!(
                space_id = view.space_id(),
                page_no = view.page_no(),
                error = %e,
                "Can't decrypt data of page"
            );
        })?;

        let len = page.len();
        let plain_end = FIL_PAGE_DATA + geometry.data_len;
        page[FIL_PAGE_DATA..plain_end].copy_from_slice(&region);
        if keyring && compressed {
            page[plain_end..plain_end + KEYRING_COMPRESSED_FOOTPRINT].fill(0);
        }
        if keyring && !compressed {
            let (head, tail) = page.split_at_mut(len - 4);
            tail.copy_from_slice(&head[FIL_PAGE_LSN_LOW..FIL_PAGE_LSN_LOW + 4]);
        }

        let mut out = PageViewMut::new(page)?;
        match page_type {
            PageType::Encrypted => out.set_raw_page_type(original_type),
            PageType::EncryptedRtree => out.set_page_type(PageType::Rtree),
            _ => out.set_page_type(PageType::Compressed),
        }
        if original_type != PageType::Allocated.as_u16() && !compressed {
            out.set_original_type(PageType::Encrypted.as_u16());
        }
        Ok(true)
    }

    /// Recomputes the post-encryption checksum of an encrypted keyring page.
    pub fn post_encryption_checksum(&self, page: &[u8]) -> CryptoResult<u32> {
        let view = PageView::new(page)?;
        self.check_page_size(page.len())?;
        let compressed = view.page_type() == PageType::CompressedAndEncrypted;
        let geometry = self.geometry(&view, compressed, EncryptionMode::Keyring)?;
        let mut copy = page.to_vec();
        if compressed {
            copy[FIL_PAGE_KEYRING_CHECKSUM_COMPRESSED..FIL_PAGE_KEYRING_CHECKSUM_COMPRESSED + 4]
                .fill(0);
        }
        Ok(checksum_of(&copy, geometry))
    }

    /// Checks the post-encryption checksum written during a master key to
    /// keyring rotation.
    pub fn verify_post_encryption_checksum(&self, page: &[u8]) -> CryptoResult<()> {
        let view = PageView::new(page)?;
        let stored = if view.page_type() == PageType::CompressedAndEncrypted {
            BigEndian::read_u32(&page[FIL_PAGE_KEYRING_CHECKSUM_COMPRESSED..])
        } else {
            view.trailer_low_word()
        };
        let actual = self.post_encryption_checksum(page)?;
        if stored != actual {
            return Err(CryptoError::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }
        Ok(())
    }
}

/// Checksum of an encrypted page image. Compressed pages are summed up to
/// the end of their ciphertext only.
fn checksum_of(page: &[u8], geometry: Geometry) -> u32 {
    if geometry.compressed {
        page_crc32(&page[..geometry.cipher_end()])
    } else {
        page_crc32(page)
    }
}
