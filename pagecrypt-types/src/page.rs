//! Bounds-checked views over a data page buffer.
//!
//! A view is constructed once per buffer; every header accessor afterwards is
//! infallible because the length was validated up front.

use crate::layout::*;
use crate::{LayoutError, LayoutResult, PageType};
use byteorder::{BigEndian, ByteOrder};

fn check_page_len(len: usize) -> LayoutResult<()> {
    if len < MIN_PAGE_SIZE {
        return Err(LayoutError::PageTooSmall {
            len,
            min: MIN_PAGE_SIZE,
        });
    }
    if len > MAX_PAGE_SIZE {
        return Err(LayoutError::PageTooLarge {
            len,
            max: MAX_PAGE_SIZE,
        });
    }
    if !len.is_power_of_two() {
        return Err(LayoutError::PageSizeNotPowerOfTwo { len });
    }
    Ok(())
}

/// Read-only view of a page.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    buf: &'a [u8],
}

impl<'a> PageView<'a> {
    /// Wraps `buf`, failing if it is not a plausible physical page size.
    pub fn new(buf: &'a [u8]) -> LayoutResult<Self> {
        check_page_len(buf.len())?;
        Ok(Self { buf })
    }

    /// Physical page length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the whole page.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Page number within the tablespace.
    #[must_use]
    pub fn page_no(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_OFFSET..])
    }

    /// Tablespace id from the header.
    #[must_use]
    pub fn space_id(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_SPACE_ID..])
    }

    /// LSN of the newest modification.
    #[must_use]
    pub fn lsn(&self) -> u64 {
        BigEndian::read_u64(&self.buf[FIL_PAGE_LSN..])
    }

    /// Raw type field, including unknown codes.
    #[must_use]
    pub fn raw_page_type(&self) -> u16 {
        BigEndian::read_u16(&self.buf[FIL_PAGE_TYPE..])
    }

    /// Decoded page type.
    #[must_use]
    pub fn page_type(&self) -> PageType {
        PageType::from_u16(self.raw_page_type())
    }

    /// True when the type field holds one of the encrypted markers.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.page_type().is_encrypted()
    }

    /// Type saved before compression or encryption rewrote the type field.
    #[must_use]
    pub fn original_type(&self) -> u16 {
        BigEndian::read_u16(&self.buf[FIL_PAGE_ORIGINAL_TYPE_V1..])
    }

    /// Transparent-compression header version.
    #[must_use]
    pub fn compression_version(&self) -> u8 {
        self.buf[FIL_PAGE_VERSION]
    }

    /// Declared compressed payload length (excluding the header).
    #[must_use]
    pub fn compressed_size(&self) -> u16 {
        BigEndian::read_u16(&self.buf[FIL_PAGE_COMPRESS_SIZE_V1..])
    }

    /// Keyring key version stamped into the header of an uncompressed page.
    #[must_use]
    pub fn key_version(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_ENCRYPTION_KEY_VERSION..])
    }

    /// Keyring key version stamped after the header of a compressed page.
    #[must_use]
    pub fn compressed_key_version(&self) -> u32 {
        BigEndian::read_u32(&self.buf[FIL_PAGE_KEYRING_VERSION_COMPRESSED..])
    }

    /// Last four bytes of the page (low LSN word, or a keyring checksum).
    #[must_use]
    pub fn trailer_low_word(&self) -> u32 {
        BigEndian::read_u32(&self.buf[self.buf.len() - 4..])
    }
}

/// Mutable view of a page.
#[derive(Debug)]
pub struct PageViewMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> PageViewMut<'a> {
    /// Wraps `buf`, failing if it is not a plausible physical page size.
    pub fn new(buf: &'a mut [u8]) -> LayoutResult<Self> {
        check_page_len(buf.len())?;
        Ok(Self { buf })
    }

    /// Reborrows as a read-only view.
    #[must_use]
    pub fn as_view(&self) -> PageView<'_> {
        PageView { buf: self.buf }
    }

    /// Physical page length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the whole page for writing.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buf
    }

    /// Writes the page number.
    pub fn set_page_no(&mut self, page_no: u32) {
        BigEndian::write_u32(&mut self.buf[FIL_PAGE_OFFSET..], page_no);
    }

    /// Writes the tablespace id.
    pub fn set_space_id(&mut self, space_id: u32) {
        BigEndian::write_u32(&mut self.buf[FIL_PAGE_SPACE_ID..], space_id);
    }

    /// Writes the LSN into the header and its low word into the trailer.
    pub fn set_lsn(&mut self, lsn: u64) {
        BigEndian::write_u64(&mut self.buf[FIL_PAGE_LSN..], lsn);
        let len = self.buf.len();
        BigEndian::write_u32(&mut self.buf[len - 4..], lsn as u32);
    }

    /// Writes a raw type code.
    pub fn set_raw_page_type(&mut self, raw: u16) {
        BigEndian::write_u16(&mut self.buf[FIL_PAGE_TYPE..], raw);
    }

    /// Writes the page type.
    pub fn set_page_type(&mut self, page_type: PageType) {
        self.set_raw_page_type(page_type.as_u16());
    }

    /// Writes the type saved before compression or encryption.
    pub fn set_original_type(&mut self, raw: u16) {
        BigEndian::write_u16(&mut self.buf[FIL_PAGE_ORIGINAL_TYPE_V1..], raw);
    }

    /// Writes the transparent-compression header version.
    pub fn set_compression_version(&mut self, version: u8) {
        self.buf[FIL_PAGE_VERSION] = version;
    }

    /// Writes the declared compressed payload length.
    pub fn set_compressed_size(&mut self, size: u16) {
        BigEndian::write_u16(&mut self.buf[FIL_PAGE_COMPRESS_SIZE_V1..], size);
    }

    /// Stamps the keyring key version of an uncompressed page.
    pub fn set_key_version(&mut self, version: u32) {
        BigEndian::write_u32(&mut self.buf[FIL_PAGE_ENCRYPTION_KEY_VERSION..], version);
    }

    /// Stamps the keyring key version of a compressed page.
    pub fn set_compressed_key_version(&mut self, version: u32) {
        BigEndian::write_u32(
            &mut self.buf[FIL_PAGE_KEYRING_VERSION_COMPRESSED..],
            version,
        );
    }

    /// Writes the post-encryption checksum slot of a compressed page.
    pub fn set_compressed_checksum(&mut self, checksum: u32) {
        BigEndian::write_u32(
            &mut self.buf[FIL_PAGE_KEYRING_CHECKSUM_COMPRESSED..],
            checksum,
        );
    }

    /// Overwrites the last four bytes of the page.
    pub fn set_trailer_low_word(&mut self, word: u32) {
        let len = self.buf.len();
        BigEndian::write_u32(&mut self.buf[len - 4..], word);
    }
}
