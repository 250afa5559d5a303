//! Byte offsets of the page header/trailer and the redo log block.
//!
//! All multi-byte fields are big-endian. These values are shared with backup
//! and recovery tooling and must not change.

// ── Data page header ─────────────────────────────────────────────

/// Checksum (or space id on very old formats), 4 bytes.
pub const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0;
/// Page number within the tablespace, 4 bytes.
pub const FIL_PAGE_OFFSET: usize = 4;
/// Previous page in the index level, 4 bytes.
pub const FIL_PAGE_PREV: usize = 8;
/// Next page in the index level, 4 bytes.
pub const FIL_PAGE_NEXT: usize = 12;
/// LSN of the newest modification, 8 bytes.
pub const FIL_PAGE_LSN: usize = 16;
/// Logical page type, 2 bytes.
pub const FIL_PAGE_TYPE: usize = 24;
/// Flush LSN, only meaningful on page 0 of the system tablespace, 8 bytes.
pub const FIL_PAGE_FILE_FLUSH_LSN: usize = 26;
/// Compression header version, 1 byte (overlays the flush LSN).
pub const FIL_PAGE_VERSION: usize = FIL_PAGE_FILE_FLUSH_LSN;
/// Compression algorithm, 1 byte.
pub const FIL_PAGE_ALGORITHM_V1: usize = FIL_PAGE_VERSION + 1;
/// Type of the page before it was compressed or encrypted, 2 bytes.
pub const FIL_PAGE_ORIGINAL_TYPE_V1: usize = FIL_PAGE_ALGORITHM_V1 + 1;
/// Uncompressed size of a compressed page, 2 bytes.
pub const FIL_PAGE_ORIGINAL_SIZE_V1: usize = FIL_PAGE_ORIGINAL_TYPE_V1 + 2;
/// Compressed payload length, 2 bytes.
pub const FIL_PAGE_COMPRESS_SIZE_V1: usize = FIL_PAGE_ORIGINAL_SIZE_V1 + 2;
/// Keyring key version of an encrypted uncompressed page, 4 bytes.
pub const FIL_PAGE_ENCRYPTION_KEY_VERSION: usize = FIL_PAGE_ORIGINAL_SIZE_V1;
/// Tablespace id, 4 bytes.
pub const FIL_PAGE_SPACE_ID: usize = 34;
/// Start of the page body.
pub const FIL_PAGE_DATA: usize = 38;

/// Size of the page trailer (old-style checksum + low 32 bits of the LSN).
pub const FIL_PAGE_END_LSN_OLD_CHKSUM: usize = 8;

/// Compressed keyring pages keep a post-encryption checksum here, 4 bytes.
pub const FIL_PAGE_KEYRING_CHECKSUM_COMPRESSED: usize = FIL_PAGE_DATA;
/// Compressed keyring pages keep the key version here, 4 bytes.
pub const FIL_PAGE_KEYRING_VERSION_COMPRESSED: usize = FIL_PAGE_DATA + 4;
/// Bytes reserved after the header of a compressed keyring page.
pub const KEYRING_COMPRESSED_FOOTPRINT: usize = 8;

/// First transparent-compression header format (ciphered length block aligned).
pub const COMPRESSION_VERSION_1: u8 = 1;
/// Second transparent-compression header format (exact ciphered length).
pub const COMPRESSION_VERSION_2: u8 = 2;

/// Smallest accepted physical page size.
pub const MIN_PAGE_SIZE: usize = 1024;
/// Largest accepted physical page size.
pub const MAX_PAGE_SIZE: usize = 65536;
/// Default logical page size.
pub const DEFAULT_PAGE_SIZE: usize = 16384;

// ── Redo log block ───────────────────────────────────────────────

/// Size of one redo log block.
pub const LOG_BLOCK_SIZE: usize = 512;
/// Block number, 4 bytes; the top bit is the flush flag.
pub const LOG_BLOCK_HDR_NO: usize = 0;
/// Flush flag inside the block number.
pub const LOG_BLOCK_FLUSH_BIT_MASK: u32 = 0x8000_0000;
/// Bytes of log data in the block, 2 bytes; the top bit is the encrypted flag.
pub const LOG_BLOCK_HDR_DATA_LEN: usize = 4;
/// Encrypted flag inside the data length field.
pub const LOG_BLOCK_ENCRYPT_BIT_MASK: u16 = 0x8000;
/// Offset of the first log record group starting in this block, 2 bytes.
pub const LOG_BLOCK_FIRST_REC_GROUP: usize = 6;
/// Checkpoint number, 4 bytes.
pub const LOG_BLOCK_CHECKPOINT_NO: usize = 8;
/// Size of the block header.
pub const LOG_BLOCK_HDR_SIZE: usize = 12;
/// Size of the block trailer.
pub const LOG_BLOCK_TRL_SIZE: usize = 4;
/// Offset of the trailer checksum.
pub const LOG_BLOCK_CHECKSUM: usize = LOG_BLOCK_SIZE - LOG_BLOCK_TRL_SIZE;
