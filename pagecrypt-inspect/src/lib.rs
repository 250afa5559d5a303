//! Key-free inspection of encrypted tablespace files and redo logs.
//!
//! Everything here reads only plaintext headers: encryption info blob
//! headers, page headers and log block headers. No keyring is consulted.

use anyhow::{Context, Result, bail};
use pagecrypt_crypto::{InfoHeader, recover_key_version};
use pagecrypt_types::layout::{LOG_BLOCK_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use pagecrypt_types::{LogBlockView, PageType, PageView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Reads a whole input file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    debug!("Read {} bytes from {:?}", bytes.len(), path);
    Ok(bytes)
}

// ── encryption info ──────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InfoReport {
    pub offset: usize,
    pub version: String,
    pub key_id: u32,
    pub uuid: Option<String>,
    pub legacy_padding: bool,
    pub encoded_len: usize,
    pub checksum: u32,
}

/// Parses the encryption info blob header found at `offset`.
pub fn inspect_info(bytes: &[u8], offset: usize) -> Result<InfoReport> {
    let blob = bytes
        .get(offset..)
        .with_context(|| format!("Offset {offset} is past the end of the input"))?;
    let header = InfoHeader::parse(blob).context("No encryption info at this offset")?;
    Ok(InfoReport {
        offset,
        version: format!("{:?}", header.version),
        key_id: header.key_id,
        encoded_len: header.encoded_len(),
        uuid: header.uuid,
        legacy_padding: header.legacy_padding,
        checksum: header.checksum,
    })
}

impl fmt::Display for InfoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Encryption info at offset {}", self.offset)?;
        writeln!(f, "  Version:        {}", self.version)?;
        let id_label = if self.version == "Rotation" {
            "Key version:   "
        } else {
            "Master key id: "
        };
        writeln!(f, "  {id_label} {}", self.key_id)?;
        writeln!(f, "  Server uuid:    {}", self.uuid.as_deref().unwrap_or("-"))?;
        writeln!(f, "  Legacy padding: {}", self.legacy_padding)?;
        writeln!(f, "  Length:         {}", self.encoded_len)?;
        write!(f, "  Checksum:       {:#010x}", self.checksum)
    }
}

// ── pages ────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PageReport {
    pub index: usize,
    pub page_no: u32,
    pub space_id: u32,
    pub lsn: u64,
    pub page_type: String,
    pub encrypted: bool,
    /// Type before encryption, for `Encrypted` pages.
    pub original_type: Option<String>,
    /// Keyring key version if the page carries one.
    pub key_version: Option<u32>,
}

fn check_page_size(page_size: usize) -> Result<()> {
    if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        bail!("Invalid page size {page_size}");
    }
    Ok(())
}

/// Classifies every page of a tablespace image.
pub fn inspect_pages(bytes: &[u8], page_size: usize) -> Result<Vec<PageReport>> {
    check_page_size(page_size)?;
    if bytes.len() % page_size != 0 {
        bail!(
            "Input of {} bytes is not a whole number of {page_size}-byte pages",
            bytes.len()
        );
    }

    bytes
        .chunks_exact(page_size)
        .enumerate()
        .map(|(index, page)| -> Result<PageReport> {
            let view = PageView::new(page).with_context(|| format!("Page {index}"))?;
            let page_type = view.page_type();
            let original_type = (page_type == PageType::Encrypted)
                .then(|| PageType::from_u16(view.original_type()).to_string());
            let key_version = match page_type {
                PageType::Encrypted | PageType::EncryptedRtree => {
                    Some(view.key_version()).filter(|&v| v != 0)
                }
                PageType::CompressedAndEncrypted => {
                    Some(view.compressed_key_version()).filter(|&v| v != 0)
                }
                _ => None,
            };
            Ok(PageReport {
                index,
                page_no: view.page_no(),
                space_id: view.space_id(),
                lsn: view.lsn(),
                page_type: page_type.to_string(),
                encrypted: view.is_encrypted(),
                original_type,
                key_version,
            })
        })
        .collect()
}

/// Page counts per type.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PageSummary {
    pub total: usize,
    pub encrypted: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl PageSummary {
    #[must_use]
    pub fn from_reports(reports: &[PageReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.total += 1;
            if report.encrypted {
                summary.encrypted += 1;
            }
            *summary.by_type.entry(report.page_type.clone()).or_default() += 1;
        }
        summary
    }
}

impl fmt::Display for PageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}  space {:<6} page {:<8} lsn {:<20} {}",
            self.index, self.space_id, self.page_no, self.lsn, self.page_type
        )?;
        if let Some(original) = &self.original_type {
            write!(f, " (was {original})")?;
        }
        if let Some(version) = self.key_version {
            write!(f, " key v{version}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} pages, {} encrypted", self.total, self.encrypted)?;
        for (page_type, count) in &self.by_type {
            writeln!(f, "  {page_type:<24} {count}")?;
        }
        Ok(())
    }
}

// ── redo log ─────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LogBlockReport {
    pub index: usize,
    pub block_no: u32,
    pub flush_start: bool,
    pub data_len: u16,
    pub first_rec_group: u16,
    pub checkpoint_no: u32,
    pub encrypted: bool,
    /// Key version folded into the checksum, meaningful for keyring-encrypted
    /// blocks only.
    pub key_version: Option<u32>,
    /// True if an unencrypted block's checksum verifies.
    pub checksum_ok: Option<bool>,
}

/// Reads the header of every block of a redo log image.
pub fn inspect_log(bytes: &[u8]) -> Result<Vec<LogBlockReport>> {
    if bytes.len() % LOG_BLOCK_SIZE != 0 {
        bail!(
            "Input of {} bytes is not a whole number of {LOG_BLOCK_SIZE}-byte blocks",
            bytes.len()
        );
    }

    bytes
        .chunks_exact(LOG_BLOCK_SIZE)
        .enumerate()
        .map(|(index, block)| -> Result<LogBlockReport> {
            let view = LogBlockView::new(block)?;
            let encrypted = view.is_encrypted();
            let key_version = if encrypted {
                Some(recover_key_version(block)?)
            } else {
                None
            };
            let checksum_ok =
                (!encrypted).then(|| view.stored_checksum() == view.calculate_checksum());
            Ok(LogBlockReport {
                index,
                block_no: view.block_no(),
                flush_start: view.is_flush_start(),
                data_len: view.data_len(),
                first_rec_group: view.first_rec_group(),
                checkpoint_no: view.checkpoint_no(),
                encrypted,
                key_version,
                checksum_ok,
            })
        })
        .collect()
}

impl fmt::Display for LogBlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}  block {:<10} len {:<4} first {:<4} checkpoint {:<8}",
            self.index, self.block_no, self.data_len, self.first_rec_group, self.checkpoint_no
        )?;
        if self.flush_start {
            write!(f, " flush")?;
        }
        match (self.key_version, self.checksum_ok) {
            (Some(version), _) => write!(f, " encrypted (key v{version} if keyring)"),
            (None, Some(true)) => write!(f, " ok"),
            (None, _) => write!(f, " BAD CHECKSUM"),
        }
    }
}
