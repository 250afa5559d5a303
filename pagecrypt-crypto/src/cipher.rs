//! AES-256 primitives over unpadded regions.
//!
//! Pages and log blocks are ciphered with AES-256-CBC without padding. A
//! region whose length is not a multiple of the block size is handled in two
//! operations: the aligned prefix is ciphered first, then the last two blocks
//! of the region are ciphered again as a unit, covering the unaligned tail.
//! Decryption runs the same steps in reverse order. Every operation restarts
//! the chain from the same iv.
//!
//! Key/iv pairs stored in encryption info blobs are wrapped with AES-256-ECB.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{AES_BLOCK_SIZE, KEY_LEN};
use aes::Aes256;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

/// Length of the trailing second-pass operation for unaligned regions.
pub const SUFFIX_LEN: usize = 2 * AES_BLOCK_SIZE;

fn check_aligned(len: usize) -> CryptoResult<()> {
    if len % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::EncryptFailed(format!(
            "{len} bytes is not a multiple of the AES block size"
        )));
    }
    Ok(())
}

fn cbc_encrypt(key: &[u8; KEY_LEN], iv: &[u8; KEY_LEN], buf: &mut [u8]) -> CryptoResult<()> {
    check_aligned(buf.len())?;
    let len = buf.len();
    Aes256CbcEnc::new_from_slices(key, &iv[..AES_BLOCK_SIZE])
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
    Ok(())
}

fn cbc_decrypt(key: &[u8; KEY_LEN], iv: &[u8; KEY_LEN], buf: &mut [u8]) -> CryptoResult<()> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::DecryptFailed(format!(
            "{} bytes is not a multiple of the AES block size",
            buf.len()
        )));
    }
    Aes256CbcDec::new_from_slices(key, &iv[..AES_BLOCK_SIZE])
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
    Ok(())
}

/// Splits a region length into its aligned prefix and whether a suffix pass
/// is needed. Unaligned regions shorter than two blocks cannot be ciphered.
pub fn region_split(len: usize) -> CryptoResult<(usize, bool)> {
    let main_len = len / AES_BLOCK_SIZE * AES_BLOCK_SIZE;
    let has_suffix = main_len != len;
    if has_suffix && len < SUFFIX_LEN {
        return Err(CryptoError::Unsupported(format!(
            "region of {len} bytes is too short to cipher"
        )));
    }
    Ok((main_len, has_suffix))
}

/// Encrypts `region` in place.
pub fn encrypt_region(
    key: &[u8; KEY_LEN],
    iv: &[u8; KEY_LEN],
    region: &mut [u8],
) -> CryptoResult<()> {
    let len = region.len();
    let (main_len, has_suffix) = region_split(len)?;
    cbc_encrypt(key, iv, &mut region[..main_len])?;
    if has_suffix {
        cbc_encrypt(key, iv, &mut region[len - SUFFIX_LEN..])?;
    }
    Ok(())
}

/// Decrypts `region` in place; the mirror of [`encrypt_region`].
pub fn decrypt_region(
    key: &[u8; KEY_LEN],
    iv: &[u8; KEY_LEN],
    region: &mut [u8],
) -> CryptoResult<()> {
    let len = region.len();
    let (main_len, has_suffix) = region_split(len)?;
    if has_suffix {
        cbc_decrypt(key, iv, &mut region[len - SUFFIX_LEN..])?;
    }
    cbc_decrypt(key, iv, &mut region[..main_len])
}

/// Wraps a key‖iv pair with a master key.
pub fn wrap_key_iv(master_key: &[u8; KEY_LEN], key_iv: &mut [u8; 2 * KEY_LEN]) -> CryptoResult<()> {
    Aes256EcbEnc::new_from_slice(master_key)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?
        .encrypt_padded_mut::<NoPadding>(&mut key_iv[..], 2 * KEY_LEN)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
    Ok(())
}

/// Unwraps a key‖iv pair previously wrapped with [`wrap_key_iv`].
pub fn unwrap_key_iv(
    master_key: &[u8; KEY_LEN],
    key_iv: &mut [u8; 2 * KEY_LEN],
) -> CryptoResult<()> {
    Aes256EcbDec::new_from_slice(master_key)
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?
        .decrypt_padded_mut::<NoPadding>(&mut key_iv[..])
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
    Ok(())
}
