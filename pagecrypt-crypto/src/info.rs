//! Encryption info blobs.
//!
//! Each encrypted tablespace stores a small blob in its first page that
//! carries the tablespace key and iv, wrapped with a master key. Four
//! formats exist on disk:
//!
//! | Version  | Magic | After the magic                                    |
//! |----------|-------|----------------------------------------------------|
//! | V1       | `lCA` | master key id, [4 zero bytes], key‖iv, crc         |
//! | V2       | `lCB` | master key id, [4 zero bytes], uuid, key‖iv, crc   |
//! | V3       | `lCC` | master key id, uuid, key‖iv, crc                   |
//! | Rotation | `lRL` | key version, uuid, iv, crc                         |
//!
//! The crc of the first three is CRC-32C over the *plaintext* key‖iv. The
//! rotation blob carries no key; its key is the keyring redo/tablespace key
//! of the recorded version, and its crc covers the first 32 bytes of the
//! blob. New blobs are always written as V3 or Rotation.

use crate::cipher::{unwrap_key_iv, wrap_key_iv};
use crate::context::EncryptionContext;
use crate::error::{CryptoError, CryptoResult};
use crate::hierarchy::{DEFAULT_MASTER_KEY_ID, KeyHierarchy};
use crate::key::{EncryptionKey, KEY_LEN, default_master_key};
use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use zeroize::Zeroizing;

/// Length of a magic tag.
pub const MAGIC_SIZE: usize = 3;
pub const KEY_MAGIC_V1: &[u8; MAGIC_SIZE] = b"lCA";
pub const KEY_MAGIC_V2: &[u8; MAGIC_SIZE] = b"lCB";
pub const KEY_MAGIC_V3: &[u8; MAGIC_SIZE] = b"lCC";
pub const KEY_MAGIC_ROTATION: &[u8; MAGIC_SIZE] = b"lRL";

/// Length of a textual server uuid.
pub const SERVER_UUID_LEN: usize = 36;

/// Size of a V3 blob.
pub const INFO_SIZE: usize = MAGIC_SIZE + 4 + SERVER_UUID_LEN + 2 * KEY_LEN + 4;

/// Largest blob on disk (V2 with the legacy padding).
pub const INFO_MAX_SIZE: usize = INFO_SIZE + 4;

/// Bytes of the rotation blob covered by its checksum.
const ROTATION_CRC_LEN: usize = KEY_LEN;

/// Blob format, identified by its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InfoVersion {
    V1,
    V2,
    V3,
    Rotation,
}

impl InfoVersion {
    #[must_use]
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic.get(..MAGIC_SIZE)? {
            m if m == KEY_MAGIC_V1 => Some(Self::V1),
            m if m == KEY_MAGIC_V2 => Some(Self::V2),
            m if m == KEY_MAGIC_V3 => Some(Self::V3),
            m if m == KEY_MAGIC_ROTATION => Some(Self::Rotation),
            _ => None,
        }
    }

    #[must_use]
    pub fn magic(self) -> &'static [u8; MAGIC_SIZE] {
        match self {
            Self::V1 => KEY_MAGIC_V1,
            Self::V2 => KEY_MAGIC_V2,
            Self::V3 => KEY_MAGIC_V3,
            Self::Rotation => KEY_MAGIC_ROTATION,
        }
    }
}

/// Header fields of a blob, readable without any key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoHeader {
    pub version: InfoVersion,
    /// Master key id, or the key version for rotation blobs.
    pub key_id: u32,
    /// Owning server uuid; `None` for V1.
    pub uuid: Option<String>,
    /// True if the legacy 4 zero bytes follow the key id.
    pub legacy_padding: bool,
    /// Offset of the key‖iv (or iv) payload.
    #[serde(skip)]
    pub payload_offset: usize,
    /// Stored checksum.
    pub checksum: u32,
}

impl InfoHeader {
    /// Parses the header of a blob.
    pub fn parse(blob: &[u8]) -> CryptoResult<Self> {
        let version = InfoVersion::from_magic(blob).ok_or(CryptoError::UnsupportedVersion)?;
        let mut offset = MAGIC_SIZE;
        let key_id = read_u32(blob, offset)?;
        offset += 4;

        let mut legacy_padding = false;
        if matches!(version, InfoVersion::V1 | InfoVersion::V2) && read_u32(blob, offset)? == 0 {
            legacy_padding = true;
            offset += 4;
        }

        let uuid = match version {
            InfoVersion::V1 => None,
            _ => {
                let uuid = read_uuid(blob, offset)?;
                offset += SERVER_UUID_LEN;
                Some(uuid)
            }
        };

        let payload_len = match version {
            InfoVersion::Rotation => KEY_LEN,
            _ => 2 * KEY_LEN,
        };
        let checksum = read_u32(blob, offset + payload_len)?;

        Ok(Self {
            version,
            key_id,
            uuid,
            legacy_padding,
            payload_offset: offset,
            checksum,
        })
    }

    /// Total encoded length.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let payload_len = match self.version {
            InfoVersion::Rotation => KEY_LEN,
            _ => 2 * KEY_LEN,
        };
        self.payload_offset + payload_len + 4
    }
}

fn truncated() -> CryptoError {
    CryptoError::DecryptFailed("encryption info is truncated".into())
}

fn read_u32(blob: &[u8], offset: usize) -> CryptoResult<u32> {
    blob.get(offset..offset + 4)
        .map(BigEndian::read_u32)
        .ok_or_else(truncated)
}

fn read_uuid(blob: &[u8], offset: usize) -> CryptoResult<String> {
    let raw = blob
        .get(offset..offset + SERVER_UUID_LEN)
        .ok_or_else(truncated)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn write_uuid(dst: &mut [u8], uuid: &str) {
    let bytes = uuid.as_bytes();
    let n = bytes.len().min(SERVER_UUID_LEN);
    dst[..n].copy_from_slice(&bytes[..n]);
    dst[n..SERVER_UUID_LEN].fill(0);
}

/// Tablespace key and iv recovered from a V1/V2/V3 blob.
#[derive(Clone)]
pub struct TablespaceKeyInfo {
    pub version: InfoVersion,
    pub master_key_id: u32,
    pub uuid: String,
    pub key: EncryptionKey,
    pub iv: [u8; KEY_LEN],
}

impl std::fmt::Debug for TablespaceKeyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TablespaceKeyInfo")
            .field("version", &self.version)
            .field("master_key_id", &self.master_key_id)
            .field("uuid", &self.uuid)
            .field("key", &self.key)
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Keyring key version and iv recovered from a rotation blob.
#[derive(Clone)]
pub struct RotationInfo {
    pub key_version: u32,
    pub uuid: String,
    pub key: Arc<EncryptionKey>,
    pub iv: [u8; KEY_LEN],
}

impl std::fmt::Debug for RotationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationInfo")
            .field("key_version", &self.key_version)
            .field("uuid", &self.uuid)
            .field("key", &self.key)
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// A decoded blob.
#[derive(Debug, Clone)]
pub enum DecodedInfo {
    Tablespace(TablespaceKeyInfo),
    Rotation(RotationInfo),
}

impl DecodedInfo {
    /// Builds the context that ciphers data described by this blob.
    #[must_use]
    pub fn into_context(self) -> EncryptionContext {
        match self {
            Self::Tablespace(info) => {
                let mut ctx = EncryptionContext::aes(info.key, info.iv);
                ctx.set_key_id(info.master_key_id);
                ctx.set_key_id_uuid(info.uuid);
                ctx
            }
            Self::Rotation(info) => {
                let mut ctx = EncryptionContext::keyring(info.key, 0, info.iv);
                ctx.set_key_version(info.key_version);
                ctx.set_key_id_uuid(info.uuid);
                ctx
            }
        }
    }
}

/// Encodes a V3 blob for `key` and `iv`.
///
/// With `wrap_key` the pair is wrapped with the current master key, created
/// on first use. During bootstrap, or before the server has a uuid, the
/// fixed default master key (id 0) is used instead. Without `wrap_key` the
/// pair is written in plaintext, for export.
pub fn encode_info(
    hierarchy: &KeyHierarchy,
    key: &EncryptionKey,
    iv: &[u8; KEY_LEN],
    bootstrap: bool,
    wrap_key: bool,
) -> CryptoResult<[u8; INFO_SIZE]> {
    let mut key_iv = Zeroizing::new([0u8; 2 * KEY_LEN]);
    key_iv[..KEY_LEN].copy_from_slice(key.as_bytes());
    key_iv[KEY_LEN..].copy_from_slice(iv);
    let crc = crc32c::crc32c(key_iv.as_slice());

    let (master_key_id, uuid) = if !wrap_key {
        (DEFAULT_MASTER_KEY_ID, hierarchy.master_key_uuid())
    } else if bootstrap || hierarchy.server_uuid().is_empty() {
        hierarchy.mark_default_master_key_used();
        wrap_key_iv(default_master_key().as_bytes(), &mut key_iv)?;
        (DEFAULT_MASTER_KEY_ID, hierarchy.master_key_uuid())
    } else {
        let (id, master_key) = hierarchy.create_master_key_if_absent()?;
        wrap_key_iv(master_key.as_bytes(), &mut key_iv)?;
        (id, master_key.uuid().to_string())
    };

    let mut blob = [0u8; INFO_SIZE];
    let mut offset = 0;
    blob[..MAGIC_SIZE].copy_from_slice(KEY_MAGIC_V3);
    offset += MAGIC_SIZE;
    BigEndian::write_u32(&mut blob[offset..], master_key_id);
    offset += 4;
    write_uuid(&mut blob[offset..], &uuid);
    offset += SERVER_UUID_LEN;
    blob[offset..offset + 2 * KEY_LEN].copy_from_slice(key_iv.as_slice());
    offset += 2 * KEY_LEN;
    BigEndian::write_u32(&mut blob[offset..], crc);
    Ok(blob)
}

/// Encodes a rotation blob recording a keyring key version and iv.
#[must_use]
pub fn encode_rotation_info(key_version: u32, uuid: &str, iv: &[u8; KEY_LEN]) -> [u8; INFO_SIZE] {
    let mut blob = [0u8; INFO_SIZE];
    let mut offset = 0;
    blob[..MAGIC_SIZE].copy_from_slice(KEY_MAGIC_ROTATION);
    offset += MAGIC_SIZE;
    BigEndian::write_u32(&mut blob[offset..], key_version);
    offset += 4;
    write_uuid(&mut blob[offset..], uuid);
    offset += SERVER_UUID_LEN;
    blob[offset..offset + KEY_LEN].copy_from_slice(iv);
    offset += KEY_LEN;
    let crc = crc32c::crc32c(&blob[..ROTATION_CRC_LEN]);
    BigEndian::write_u32(&mut blob[offset..], crc);
    blob
}

/// Decodes a blob and resolves its key.
///
/// While `recovery` is set, a blob with no recognizable magic has simply
/// not been written yet and yields `Ok(None)`. With `decrypt_key` unset the
/// payload is read as plaintext; only V3 blobs can be read that way.
pub fn decode_info(
    hierarchy: &KeyHierarchy,
    blob: &[u8],
    decrypt_key: bool,
    recovery: bool,
) -> CryptoResult<Option<DecodedInfo>> {
    if InfoVersion::from_magic(blob).is_none() {
        if recovery {
            debug!("no encryption info found during recovery");
            return Ok(None);
        }
        error!("Failed to decrypt encryption information, found unexpected version of it");
        return Err(CryptoError::UnsupportedVersion);
    }

    let header = InfoHeader::parse(blob)?;
    let uuid = header.uuid.clone().unwrap_or_default();

    if header.version == InfoVersion::Rotation {
        let actual = crc32c::crc32c(&blob[..ROTATION_CRC_LEN]);
        if actual != header.checksum {
            error!("Failed to decode rotation encryption information");
            return Err(CryptoError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
        let mut iv = [0u8; KEY_LEN];
        iv.copy_from_slice(&blob[header.payload_offset..header.payload_offset + KEY_LEN]);
        let key = hierarchy.get_redo_key_version(&uuid, header.key_id)?;
        return Ok(Some(DecodedInfo::Rotation(RotationInfo {
            key_version: header.key_id,
            uuid,
            key,
            iv,
        })));
    }

    let mut key_iv = Zeroizing::new([0u8; 2 * KEY_LEN]);
    key_iv.copy_from_slice(&blob[header.payload_offset..header.payload_offset + 2 * KEY_LEN]);

    if decrypt_key {
        let master_key = match header.version {
            InfoVersion::V1 => hierarchy.get_master_key(header.key_id, None)?,
            InfoVersion::V3 if header.key_id == DEFAULT_MASTER_KEY_ID => default_master_key(),
            _ => hierarchy.get_master_key(header.key_id, Some(&uuid))?,
        };
        unwrap_key_iv(master_key.as_bytes(), &mut key_iv)?;
    } else if header.version != InfoVersion::V3 {
        return Err(CryptoError::Unsupported(
            "only V3 encryption info can be read without a master key".into(),
        ));
    }

    let actual = crc32c::crc32c(key_iv.as_slice());
    if actual != header.checksum {
        error!("Failed to decrypt encryption information, please check whether key file has been changed");
        return Err(CryptoError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }

    if decrypt_key {
        hierarchy.observe_master_key(header.key_id, &uuid);
    }

    let key = EncryptionKey::from_slice(&key_iv[..KEY_LEN])?.with_uuid(&uuid);
    let mut iv = [0u8; KEY_LEN];
    iv.copy_from_slice(&key_iv[KEY_LEN..]);

    Ok(Some(DecodedInfo::Tablespace(TablespaceKeyInfo {
        version: header.version,
        master_key_id: header.key_id,
        uuid,
        key,
        iv,
    })))
}

/// Decodes a blob into a ready-to-use context.
pub fn decode_context(
    hierarchy: &KeyHierarchy,
    blob: &[u8],
    recovery: bool,
) -> CryptoResult<Option<EncryptionContext>> {
    Ok(decode_info(hierarchy, blob, true, recovery)?.map(DecodedInfo::into_context))
}
