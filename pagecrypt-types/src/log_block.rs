//! Views over a single 512-byte redo log block.

use crate::layout::*;
use crate::{LayoutError, LayoutResult};
use byteorder::{BigEndian, ByteOrder};

fn check_block_len(len: usize) -> LayoutResult<()> {
    if len != LOG_BLOCK_SIZE {
        return Err(LayoutError::LogBlockSize {
            expected: LOG_BLOCK_SIZE,
            actual: len,
        });
    }
    Ok(())
}

fn block_checksum(buf: &[u8]) -> u32 {
    crc32c::crc32c(&buf[..LOG_BLOCK_CHECKSUM])
}

/// Read-only view of a redo log block.
#[derive(Debug, Clone, Copy)]
pub struct LogBlockView<'a> {
    buf: &'a [u8],
}

impl<'a> LogBlockView<'a> {
    /// Wraps `buf`, failing unless it is exactly one block long.
    pub fn new(buf: &'a [u8]) -> LayoutResult<Self> {
        check_block_len(buf.len())?;
        Ok(Self { buf })
    }

    /// Returns the whole block.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Block number without the flush flag.
    #[must_use]
    pub fn block_no(&self) -> u32 {
        BigEndian::read_u32(&self.buf[LOG_BLOCK_HDR_NO..]) & !LOG_BLOCK_FLUSH_BIT_MASK
    }

    /// True if the block starts a log flush.
    #[must_use]
    pub fn is_flush_start(&self) -> bool {
        BigEndian::read_u32(&self.buf[LOG_BLOCK_HDR_NO..]) & LOG_BLOCK_FLUSH_BIT_MASK != 0
    }

    /// Bytes of log data in the block, without the encrypted flag.
    #[must_use]
    pub fn data_len(&self) -> u16 {
        BigEndian::read_u16(&self.buf[LOG_BLOCK_HDR_DATA_LEN..]) & !LOG_BLOCK_ENCRYPT_BIT_MASK
    }

    /// True if the encrypted flag is set.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        BigEndian::read_u16(&self.buf[LOG_BLOCK_HDR_DATA_LEN..]) & LOG_BLOCK_ENCRYPT_BIT_MASK != 0
    }

    /// Offset of the first record group starting in this block.
    #[must_use]
    pub fn first_rec_group(&self) -> u16 {
        BigEndian::read_u16(&self.buf[LOG_BLOCK_FIRST_REC_GROUP..])
    }

    /// Checkpoint number the block was written under.
    #[must_use]
    pub fn checkpoint_no(&self) -> u32 {
        BigEndian::read_u32(&self.buf[LOG_BLOCK_CHECKPOINT_NO..])
    }

    /// Checksum stored in the trailer.
    #[must_use]
    pub fn stored_checksum(&self) -> u32 {
        BigEndian::read_u32(&self.buf[LOG_BLOCK_CHECKSUM..])
    }

    /// CRC-32C over everything but the trailer.
    #[must_use]
    pub fn calculate_checksum(&self) -> u32 {
        block_checksum(self.buf)
    }
}

/// Mutable view of a redo log block.
#[derive(Debug)]
pub struct LogBlockViewMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> LogBlockViewMut<'a> {
    /// Wraps `buf`, failing unless it is exactly one block long.
    pub fn new(buf: &'a mut [u8]) -> LayoutResult<Self> {
        check_block_len(buf.len())?;
        Ok(Self { buf })
    }

    /// Reborrows as a read-only view.
    #[must_use]
    pub fn as_view(&self) -> LogBlockView<'_> {
        LogBlockView { buf: self.buf }
    }

    /// Returns the whole block for writing.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buf
    }

    /// Writes the block number and the flush flag.
    pub fn set_block_no(&mut self, block_no: u32, flush_start: bool) {
        let mut raw = block_no & !LOG_BLOCK_FLUSH_BIT_MASK;
        if flush_start {
            raw |= LOG_BLOCK_FLUSH_BIT_MASK;
        }
        BigEndian::write_u32(&mut self.buf[LOG_BLOCK_HDR_NO..], raw);
    }

    /// Sets the data length, keeping the encrypted flag as it is.
    pub fn set_data_len(&mut self, len: u16) {
        let flag = BigEndian::read_u16(&self.buf[LOG_BLOCK_HDR_DATA_LEN..]) & LOG_BLOCK_ENCRYPT_BIT_MASK;
        BigEndian::write_u16(
            &mut self.buf[LOG_BLOCK_HDR_DATA_LEN..],
            (len & !LOG_BLOCK_ENCRYPT_BIT_MASK) | flag,
        );
    }

    /// Sets or clears the encrypted flag.
    pub fn set_encrypted(&mut self, encrypted: bool) {
        let mut raw = BigEndian::read_u16(&self.buf[LOG_BLOCK_HDR_DATA_LEN..]);
        if encrypted {
            raw |= LOG_BLOCK_ENCRYPT_BIT_MASK;
        } else {
            raw &= !LOG_BLOCK_ENCRYPT_BIT_MASK;
        }
        BigEndian::write_u16(&mut self.buf[LOG_BLOCK_HDR_DATA_LEN..], raw);
    }

    /// Writes the first record group offset.
    pub fn set_first_rec_group(&mut self, offset: u16) {
        BigEndian::write_u16(&mut self.buf[LOG_BLOCK_FIRST_REC_GROUP..], offset);
    }

    /// Writes the checkpoint number.
    pub fn set_checkpoint_no(&mut self, checkpoint_no: u32) {
        BigEndian::write_u32(&mut self.buf[LOG_BLOCK_CHECKPOINT_NO..], checkpoint_no);
    }

    /// Writes the trailer checksum as given.
    pub fn set_checksum(&mut self, checksum: u32) {
        BigEndian::write_u32(&mut self.buf[LOG_BLOCK_CHECKSUM..], checksum);
    }

    /// Recomputes the plain CRC-32C checksum and stores it.
    pub fn update_checksum(&mut self) {
        let crc = block_checksum(self.buf);
        self.set_checksum(crc);
    }
}
