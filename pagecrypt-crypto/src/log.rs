//! Redo log block encryption.
//!
//! The 12-byte block header stays plaintext and carries the encrypted flag.
//! Master-key mode ciphers the remaining 500 bytes, trailer included.
//! Keyring mode ciphers the 496 payload bytes and folds the key version into
//! the trailer checksum: `crc32c(block[..508]) + version`, so a reader
//! recovers the version by subtraction.

use crate::cipher::{decrypt_region, encrypt_region};
use crate::context::EncryptionContext;
use crate::error::{CryptoError, CryptoResult};
use crate::hierarchy::KeyHierarchy;
use pagecrypt_types::layout::{LOG_BLOCK_CHECKSUM, LOG_BLOCK_HDR_SIZE, LOG_BLOCK_SIZE};
use pagecrypt_types::{EncryptionMode, LogBlockView, LogBlockViewMut};
use tracing::{debug, error};

/// End of the ciphered region for `mode`.
fn cipher_end(mode: EncryptionMode) -> usize {
    match mode {
        EncryptionMode::Keyring => LOG_BLOCK_CHECKSUM,
        _ => LOG_BLOCK_SIZE,
    }
}

/// Key version folded into the checksum of a keyring-encrypted block.
pub fn recover_key_version(block: &[u8]) -> CryptoResult<u32> {
    let view = LogBlockView::new(block)?;
    Ok(view.stored_checksum().wrapping_sub(view.calculate_checksum()))
}

/// Encrypts one 512-byte block in place.
///
/// The block is left untouched on error.
pub fn encrypt_log_block(ctx: &EncryptionContext, block: &mut [u8]) -> CryptoResult<()> {
    let view = LogBlockView::new(block)?;
    if view.is_encrypted() {
        return Err(CryptoError::EncryptFailed(format!(
            "log block {} is already encrypted",
            view.block_no()
        )));
    }
    let (key, iv) = ctx.require_key_iv()?;
    let mode = ctx.mode();
    let end = cipher_end(mode);

    let mut region = block[LOG_BLOCK_HDR_SIZE..end].to_vec();
    encrypt_region(key.as_bytes(), iv, &mut region).inspect_err(|e| {
        error!(block_no = view.block_no(), error = %e, "Can't encrypt data of redo log");
    })?;

    block[LOG_BLOCK_HDR_SIZE..end].copy_from_slice(&region);
    let mut out = LogBlockViewMut::new(block)?;
    out.set_encrypted(true);
    if mode == EncryptionMode::Keyring {
        let checksum = out.as_view().calculate_checksum();
        out.set_checksum(checksum.wrapping_add(ctx.key_version()));
    }
    Ok(())
}

/// Decrypts one 512-byte block in place.
///
/// Returns `Ok(false)` for a block whose encrypted flag is clear. In keyring
/// mode a block written under another key version switches `ctx` to that
/// version, loading it from the context cache or the redo key class. The
/// switch only happens once the block has decrypted.
pub fn decrypt_log_block(
    ctx: &mut EncryptionContext,
    hierarchy: &KeyHierarchy,
    block: &mut [u8],
) -> CryptoResult<bool> {
    let view = LogBlockView::new(block)?;
    if !view.is_encrypted() {
        return Ok(false);
    }
    let block_no = view.block_no();
    let mode = ctx.mode();
    if !mode.is_active() {
        return Err(CryptoError::DecryptFailed(format!(
            "log block {block_no} is encrypted but no encryption is configured"
        )));
    }

    let mut switch_to = None;
    if mode == EncryptionMode::Keyring {
        let version = recover_key_version(block)?;
        if version != ctx.key_version() && version != 0 {
            let key = match ctx.cached_key(version) {
                Some(key) => key,
                None => hierarchy
                    .get_redo_key_version(ctx.key_id_uuid(), version)
                    .inspect_err(|e| {
                        error!(block_no, version, error = %e, "Can't find redo log encryption key");
                    })?,
            };
            switch_to = Some((version, key));
        }
    }

    let (current_key, iv) = ctx
        .require_key_iv()
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
    let key = switch_to.as_ref().map_or(current_key, |(_, key)| key);
    let end = cipher_end(mode);
    let mut region = block[LOG_BLOCK_HDR_SIZE..end].to_vec();
    decrypt_region(key.as_bytes(), iv, &mut region).inspect_err(|e| {
        error!(block_no, error = %e, "Can't decrypt data of redo log");
    })?;

    if let Some((version, key)) = switch_to {
        debug!(from = ctx.key_version(), to = version, "switching redo log key version");
        ctx.set_key(Some(key));
        ctx.set_key_version(version);
    }

    block[LOG_BLOCK_HDR_SIZE..end].copy_from_slice(&region);
    let mut out = LogBlockViewMut::new(block)?;
    out.set_encrypted(false);
    if mode == EncryptionMode::Keyring {
        out.update_checksum();
    }
    Ok(true)
}

fn check_log_len(len: usize) -> CryptoResult<()> {
    if len % LOG_BLOCK_SIZE != 0 {
        return Err(CryptoError::Unsupported(format!(
            "log buffer of {len} bytes is not a whole number of blocks"
        )));
    }
    Ok(())
}

/// Encrypts a run of log blocks into a new buffer.
pub fn encrypt_log(ctx: &EncryptionContext, src: &[u8]) -> CryptoResult<Vec<u8>> {
    check_log_len(src.len())?;
    let mut dst = src.to_vec();
    for block in dst.chunks_exact_mut(LOG_BLOCK_SIZE) {
        encrypt_log_block(ctx, block)?;
    }
    debug!(blocks = src.len() / LOG_BLOCK_SIZE, mode = %ctx.mode(), "encrypted redo log");
    Ok(dst)
}

/// Decrypts a run of log blocks in place, skipping plaintext blocks.
/// Returns the number of blocks decrypted.
pub fn decrypt_log(
    ctx: &mut EncryptionContext,
    hierarchy: &KeyHierarchy,
    buf: &mut [u8],
) -> CryptoResult<usize> {
    check_log_len(buf.len())?;
    let mut decrypted = 0;
    for block in buf.chunks_exact_mut(LOG_BLOCK_SIZE) {
        if decrypt_log_block(ctx, hierarchy, block)? {
            decrypted += 1;
        }
    }
    Ok(decrypted)
}
