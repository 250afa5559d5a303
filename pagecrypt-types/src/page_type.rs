//! Logical page types stored in the 2-byte `FIL_PAGE_TYPE` field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a data page.
///
/// The three encrypted variants are synthetic markers written only by the
/// page codec. Every other value is a real logical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageType {
    /// Freshly allocated, never written.
    Allocated,
    UndoLog,
    Inode,
    IbufFreeList,
    IbufBitmap,
    Sys,
    TrxSys,
    /// File space header.
    FspHdr,
    /// Extent descriptor.
    Xdes,
    Blob,
    ZBlob,
    ZBlob2,
    Unknown,
    /// Transparently compressed page.
    Compressed,
    /// Encrypted page; the original type lives in `FIL_PAGE_ORIGINAL_TYPE_V1`.
    Encrypted,
    /// Compressed then encrypted page.
    CompressedAndEncrypted,
    /// Encrypted R-tree page.
    EncryptedRtree,
    SdiBlob,
    SdiZBlob,
    LegacyDoublewrite,
    RsegArray,
    LobIndex,
    LobData,
    LobFirst,
    Sdi,
    /// Spatial index page.
    Rtree,
    /// B-tree index page.
    Index,
    /// A value this crate does not name.
    Other(u16),
}

impl PageType {
    /// Decodes a raw page type.
    #[must_use]
    pub const fn from_u16(raw: u16) -> Self {
        match raw {
            0 => Self::Allocated,
            2 => Self::UndoLog,
            3 => Self::Inode,
            4 => Self::IbufFreeList,
            5 => Self::IbufBitmap,
            6 => Self::Sys,
            7 => Self::TrxSys,
            8 => Self::FspHdr,
            9 => Self::Xdes,
            10 => Self::Blob,
            11 => Self::ZBlob,
            12 => Self::ZBlob2,
            13 => Self::Unknown,
            14 => Self::Compressed,
            15 => Self::Encrypted,
            16 => Self::CompressedAndEncrypted,
            17 => Self::EncryptedRtree,
            18 => Self::SdiBlob,
            19 => Self::SdiZBlob,
            20 => Self::LegacyDoublewrite,
            21 => Self::RsegArray,
            22 => Self::LobIndex,
            23 => Self::LobData,
            24 => Self::LobFirst,
            17853 => Self::Sdi,
            17854 => Self::Rtree,
            17855 => Self::Index,
            other => Self::Other(other),
        }
    }

    /// Returns the raw on-disk value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Allocated => 0,
            Self::UndoLog => 2,
            Self::Inode => 3,
            Self::IbufFreeList => 4,
            Self::IbufBitmap => 5,
            Self::Sys => 6,
            Self::TrxSys => 7,
            Self::FspHdr => 8,
            Self::Xdes => 9,
            Self::Blob => 10,
            Self::ZBlob => 11,
            Self::ZBlob2 => 12,
            Self::Unknown => 13,
            Self::Compressed => 14,
            Self::Encrypted => 15,
            Self::CompressedAndEncrypted => 16,
            Self::EncryptedRtree => 17,
            Self::SdiBlob => 18,
            Self::SdiZBlob => 19,
            Self::LegacyDoublewrite => 20,
            Self::RsegArray => 21,
            Self::LobIndex => 22,
            Self::LobData => 23,
            Self::LobFirst => 24,
            Self::Sdi => 17853,
            Self::Rtree => 17854,
            Self::Index => 17855,
            Self::Other(raw) => raw,
        }
    }

    /// True for the synthetic markers written by the page codec.
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        matches!(
            self,
            Self::Encrypted | Self::CompressedAndEncrypted | Self::EncryptedRtree
        )
    }

    /// True for types that are read during recovery bootstrap, before any key
    /// is available, and therefore stay plaintext under keyring encryption.
    #[must_use]
    pub const fn is_bootstrap_plaintext(self) -> bool {
        matches!(self, Self::FspHdr | Self::Xdes | Self::Rtree)
    }
}

impl From<u16> for PageType {
    fn from(raw: u16) -> Self {
        Self::from_u16(raw)
    }
}

impl From<PageType> for u16 {
    fn from(page_type: PageType) -> Self {
        page_type.as_u16()
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "Other({raw})"),
            named => write!(f, "{named:?}"),
        }
    }
}
