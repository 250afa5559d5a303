use byteorder::{BigEndian, ByteOrder};
use pagecrypt_crypto::cipher::wrap_key_iv;
use pagecrypt_crypto::info::{KEY_MAGIC_V1, KEY_MAGIC_V2, SERVER_UUID_LEN};
use pagecrypt_crypto::names::{legacy_master_key_name, master_key_name};
use pagecrypt_crypto::{
    CryptoError, DEFAULT_MASTER_KEY_ID, DecodedInfo, EncryptionConfig, EncryptionKey,
    INFO_MAX_SIZE, INFO_SIZE, InfoHeader, InfoVersion, KEY_LEN, KeyHierarchy, decode_context,
    decode_info, encode_info, encode_rotation_info, generate_random_iv, generate_random_key,
};
use pagecrypt_keyring::{Keyring, MemoryKeyring};
use pagecrypt_types::EncryptionMode;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const UUID: &str = "8a94f357-aab4-11df-86ab-c80aa9429562";

fn setup_with(config: EncryptionConfig) -> (Arc<MemoryKeyring>, KeyHierarchy) {
    let keyring = Arc::new(MemoryKeyring::new());
    let shared: Arc<dyn Keyring> = keyring.clone();
    (keyring, KeyHierarchy::new(shared, &config))
}

fn setup() -> (Arc<MemoryKeyring>, KeyHierarchy) {
    setup_with(EncryptionConfig::with_uuid(UUID))
}

fn tablespace(decoded: Option<DecodedInfo>) -> pagecrypt_crypto::TablespaceKeyInfo {
    match decoded {
        Some(DecodedInfo::Tablespace(info)) => info,
        other => panic!("expected tablespace info, got {other:?}"),
    }
}

/// Builds a V1 or V2 blob the way older servers wrote them, optionally with
/// the 4 zero bytes after the key id.
fn legacy_blob(
    magic: &[u8; 3],
    padded: bool,
    key_id: u32,
    uuid: Option<&str>,
    master_key: &[u8; KEY_LEN],
    key: &EncryptionKey,
    iv: &[u8; KEY_LEN],
) -> Vec<u8> {
    let mut key_iv = [0u8; 2 * KEY_LEN];
    key_iv[..KEY_LEN].copy_from_slice(key.as_bytes());
    key_iv[KEY_LEN..].copy_from_slice(iv);
    let crc = crc32c::crc32c(&key_iv);
    wrap_key_iv(master_key, &mut key_iv).unwrap();

    let mut blob = magic.to_vec();
    blob.extend_from_slice(&key_id.to_be_bytes());
    if padded {
        blob.extend_from_slice(&[0; 4]);
    }
    if let Some(uuid) = uuid {
        let mut raw = [0u8; SERVER_UUID_LEN];
        raw[..uuid.len()].copy_from_slice(uuid.as_bytes());
        blob.extend_from_slice(&raw);
    }
    blob.extend_from_slice(&key_iv);
    blob.extend_from_slice(&crc.to_be_bytes());
    blob
}

// ── V3 ───────────────────────────────────────────────────────────

#[test]
fn v3_wrapped_roundtrip() {
    let (keyring, hierarchy) = setup();
    let key = generate_random_key();
    let iv = generate_random_iv();

    let blob = encode_info(&hierarchy, &key, &iv, false, true).unwrap();
    assert_eq!(&blob[..3], b"lCC");
    assert!(keyring.contains(&master_key_name(UUID, 1)));
    assert_ne!(&blob[43..43 + KEY_LEN], key.as_bytes().as_slice());

    let header = InfoHeader::parse(&blob).unwrap();
    assert_eq!(header.version, InfoVersion::V3);
    assert_eq!(header.key_id, 1);
    assert_eq!(header.uuid.as_deref(), Some(UUID));
    assert!(!header.legacy_padding);
    assert_eq!(header.encoded_len(), INFO_SIZE);

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.version, InfoVersion::V3);
    assert_eq!(info.master_key_id, 1);
    assert_eq!(info.uuid, UUID);
    assert_eq!(info.key.as_bytes(), key.as_bytes());
    assert_eq!(info.iv, iv);
}

#[test]
fn bootstrap_uses_default_master_key() {
    let (keyring, hierarchy) = setup();
    let key = generate_random_key();
    let iv = generate_random_iv();

    let blob = encode_info(&hierarchy, &key, &iv, true, true).unwrap();
    assert_eq!(BigEndian::read_u32(&blob[3..7]), DEFAULT_MASTER_KEY_ID);
    assert!(hierarchy.default_master_key_used());
    assert!(!keyring.contains(&master_key_name(UUID, 1)));

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.master_key_id, DEFAULT_MASTER_KEY_ID);
    assert_eq!(info.key.as_bytes(), key.as_bytes());
    assert_eq!(hierarchy.master_key_id(), DEFAULT_MASTER_KEY_ID);
}

#[test]
fn server_without_uuid_uses_default_master_key() {
    let (keyring, hierarchy) = setup_with(EncryptionConfig::default());
    let key = generate_random_key();
    let iv = generate_random_iv();

    let blob = encode_info(&hierarchy, &key, &iv, false, true).unwrap();
    assert_eq!(InfoHeader::parse(&blob).unwrap().key_id, DEFAULT_MASTER_KEY_ID);
    assert_eq!(keyring.generate_count(), 0);

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.iv, iv);
}

#[test]
fn unwrapped_export_is_readable_without_keys() {
    let (_keyring, hierarchy) = setup();
    let key = generate_random_key();
    let iv = generate_random_iv();

    let blob = encode_info(&hierarchy, &key, &iv, false, false).unwrap();
    assert_eq!(&blob[43..43 + KEY_LEN], key.as_bytes().as_slice());

    let info = tablespace(decode_info(&hierarchy, &blob, false, false).unwrap());
    assert_eq!(info.key.as_bytes(), key.as_bytes());
    assert_eq!(info.iv, iv);
}

#[test]
fn decode_advances_master_key_id() {
    let keyring = Arc::new(MemoryKeyring::new());
    let shared: Arc<dyn Keyring> = keyring.clone();
    let config = EncryptionConfig::with_uuid(UUID);
    let writer = KeyHierarchy::new(Arc::clone(&shared), &config);
    writer.create_master_key_if_absent().unwrap();
    writer.rotate_master_key().unwrap();

    let key = generate_random_key();
    let iv = generate_random_iv();
    let blob = encode_info(&writer, &key, &iv, false, true).unwrap();

    let reader = KeyHierarchy::new(shared, &config);
    assert_eq!(reader.master_key_id(), DEFAULT_MASTER_KEY_ID);
    decode_info(&reader, &blob, true, false).unwrap();
    assert_eq!(reader.master_key_id(), 2);
    assert_eq!(reader.master_key_uuid(), UUID);
}

#[test]
fn keyless_decode_does_not_touch_master_key() {
    let (_keyring, hierarchy) = setup();
    let key = generate_random_key();
    let iv = generate_random_iv();
    let mut blob = encode_info(&hierarchy, &key, &iv, false, false).unwrap();
    BigEndian::write_u32(&mut blob[3..7], 9);

    decode_info(&hierarchy, &blob, false, false).unwrap();
    assert_eq!(hierarchy.master_key_id(), DEFAULT_MASTER_KEY_ID);
}

// ── legacy formats ───────────────────────────────────────────────

#[test]
fn v2_with_padding_decodes() {
    let (keyring, hierarchy) = setup();
    keyring.insert(&master_key_name(UUID, 1), &[7; KEY_LEN]);
    let key = generate_random_key();
    let iv = generate_random_iv();
    let blob = legacy_blob(KEY_MAGIC_V2, true, 1, Some(UUID), &[7; KEY_LEN], &key, &iv);
    assert_eq!(blob.len(), INFO_MAX_SIZE);

    let header = InfoHeader::parse(&blob).unwrap();
    assert_eq!(header.version, InfoVersion::V2);
    assert!(header.legacy_padding);
    assert_eq!(header.encoded_len(), INFO_MAX_SIZE);

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.version, InfoVersion::V2);
    assert_eq!(info.key.as_bytes(), key.as_bytes());
    assert_eq!(info.iv, iv);
}

#[test]
fn v1_uses_legacy_master_key_name() {
    let config = EncryptionConfig {
        server_id: 42,
        ..EncryptionConfig::with_uuid(UUID)
    };
    let (keyring, hierarchy) = setup_with(config);
    keyring.insert(&legacy_master_key_name(42, 3), &[5; KEY_LEN]);
    let key = generate_random_key();
    let iv = generate_random_iv();
    let blob = legacy_blob(KEY_MAGIC_V1, true, 3, None, &[5; KEY_LEN], &key, &iv);

    let header = InfoHeader::parse(&blob).unwrap();
    assert_eq!(header.uuid, None);
    assert!(header.legacy_padding);

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.version, InfoVersion::V1);
    assert_eq!(info.master_key_id, 3);
    assert_eq!(info.key.as_bytes(), key.as_bytes());
}

#[test]
fn v2_without_padding_decodes() {
    let (keyring, hierarchy) = setup();
    keyring.insert(&master_key_name(UUID, 1), &[7; KEY_LEN]);
    let key = generate_random_key();
    let iv = generate_random_iv();
    let blob = legacy_blob(KEY_MAGIC_V2, false, 1, Some(UUID), &[7; KEY_LEN], &key, &iv);
    assert_eq!(blob.len(), INFO_SIZE);

    let header = InfoHeader::parse(&blob).unwrap();
    assert_eq!(header.version, InfoVersion::V2);
    assert!(!header.legacy_padding);
    assert_eq!(header.uuid.as_deref(), Some(UUID));
    assert_eq!(header.encoded_len(), 111);

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.version, InfoVersion::V2);
    assert_eq!(info.master_key_id, 1);
    assert_eq!(info.key.as_bytes(), key.as_bytes());
    assert_eq!(info.iv, iv);
}

#[test]
fn v1_without_padding_decodes() {
    let config = EncryptionConfig {
        server_id: 42,
        ..EncryptionConfig::with_uuid(UUID)
    };
    let (keyring, hierarchy) = setup_with(config);
    keyring.insert(&legacy_master_key_name(42, 2), &[9; KEY_LEN]);
    let key = generate_random_key();
    let iv = generate_random_iv();
    let blob = legacy_blob(KEY_MAGIC_V1, false, 2, None, &[9; KEY_LEN], &key, &iv);
    assert_eq!(blob.len(), 75);

    let header = InfoHeader::parse(&blob).unwrap();
    assert_eq!(header.version, InfoVersion::V1);
    assert!(!header.legacy_padding);
    assert_eq!(header.uuid, None);
    assert_eq!(header.encoded_len(), 75);

    let info = tablespace(decode_info(&hierarchy, &blob, true, false).unwrap());
    assert_eq!(info.version, InfoVersion::V1);
    assert_eq!(info.master_key_id, 2);
    assert_eq!(info.key.as_bytes(), key.as_bytes());
    assert_eq!(info.iv, iv);
}

#[test]
fn legacy_formats_need_master_key() {
    let (keyring, hierarchy) = setup();
    keyring.insert(&master_key_name(UUID, 1), &[7; KEY_LEN]);
    let blob = legacy_blob(
        KEY_MAGIC_V2,
        true,
        1,
        Some(UUID),
        &[7; KEY_LEN],
        &generate_random_key(),
        &generate_random_iv(),
    );

    let err = decode_info(&hierarchy, &blob, false, false).unwrap_err();
    assert!(matches!(err, CryptoError::Unsupported(_)));
}

// ── rotation blob ────────────────────────────────────────────────

#[test]
fn rotation_blob_resolves_keyring_version() {
    let (_keyring, hierarchy) = setup();
    let (version, key) = hierarchy.get_or_create_redo_key(UUID).unwrap();
    let iv = generate_random_iv();

    let blob = encode_rotation_info(version, UUID, &iv);
    assert_eq!(&blob[..3], b"lRL");
    let stored = BigEndian::read_u32(&blob[3 + 4 + SERVER_UUID_LEN + KEY_LEN..]);
    assert_eq!(stored, crc32c::crc32c(&blob[..32]));

    let decoded = decode_info(&hierarchy, &blob, true, false).unwrap();
    let Some(DecodedInfo::Rotation(info)) = decoded else {
        panic!("expected rotation info");
    };
    assert_eq!(info.key_version, version);
    assert_eq!(info.uuid, UUID);
    assert_eq!(info.iv, iv);
    assert_eq!(info.key.as_bytes(), key.as_bytes());

    let ctx = DecodedInfo::Rotation(info).into_context();
    assert_eq!(ctx.mode(), EncryptionMode::Keyring);
    assert_eq!(ctx.key_version(), version);
    assert_eq!(ctx.key_id_uuid(), UUID);
}

#[test]
fn rotation_blob_with_unknown_version_fails() {
    let (_keyring, hierarchy) = setup();
    let blob = encode_rotation_info(4, UUID, &generate_random_iv());
    let err = decode_info(&hierarchy, &blob, true, false).unwrap_err();
    assert!(err.is_key_not_found());
}

#[test]
fn tampered_rotation_header_is_detected() {
    let (_keyring, hierarchy) = setup();
    hierarchy.get_or_create_redo_key(UUID).unwrap();
    let mut blob = encode_rotation_info(1, UUID, &generate_random_iv());
    blob[10] ^= 0x01;

    let err = decode_info(&hierarchy, &blob, true, false).unwrap_err();
    assert!(matches!(err, CryptoError::ChecksumMismatch { .. }));
}

// ── failures ─────────────────────────────────────────────────────

#[test]
fn tampered_key_is_checksum_mismatch() {
    let (_keyring, hierarchy) = setup();
    let key = generate_random_key();
    let iv = generate_random_iv();
    let mut blob = encode_info(&hierarchy, &key, &iv, false, true).unwrap();
    blob[50] ^= 0x80;

    let err = decode_info(&hierarchy, &blob, true, false).unwrap_err();
    assert!(matches!(err, CryptoError::ChecksumMismatch { .. }));
    assert!(err.is_integrity_failure());
}

#[test]
fn wrong_master_key_is_checksum_mismatch() {
    let (keyring, hierarchy) = setup();
    let blob = encode_info(
        &hierarchy,
        &generate_random_key(),
        &generate_random_iv(),
        false,
        true,
    )
    .unwrap();
    keyring.insert(&master_key_name(UUID, 1), &[0; KEY_LEN]);

    let err = decode_info(&hierarchy, &blob, true, false).unwrap_err();
    assert!(matches!(err, CryptoError::ChecksumMismatch { .. }));
}

#[test]
fn missing_blob_during_recovery_is_none() {
    let (_keyring, hierarchy) = setup();
    let blob = [0u8; INFO_SIZE];
    assert!(decode_info(&hierarchy, &blob, true, true).unwrap().is_none());
    assert!(decode_context(&hierarchy, &blob, true).unwrap().is_none());
}

#[test]
fn unknown_magic_is_unsupported_version() {
    let (_keyring, hierarchy) = setup();
    let mut blob = [0u8; INFO_SIZE];
    blob[..3].copy_from_slice(b"lCZ");
    let err = decode_info(&hierarchy, &blob, true, false).unwrap_err();
    assert!(matches!(err, CryptoError::UnsupportedVersion));
    assert!(matches!(
        InfoHeader::parse(&blob),
        Err(CryptoError::UnsupportedVersion)
    ));
}

#[test]
fn truncated_blob_is_rejected() {
    let (_keyring, hierarchy) = setup();
    let blob = encode_info(
        &hierarchy,
        &generate_random_key(),
        &generate_random_iv(),
        false,
        true,
    )
    .unwrap();
    let err = decode_info(&hierarchy, &blob[..60], true, false).unwrap_err();
    assert!(matches!(err, CryptoError::DecryptFailed(_)));
}

#[test]
fn decode_context_builds_aes_context() {
    let (_keyring, hierarchy) = setup();
    let key = generate_random_key();
    let iv = generate_random_iv();
    let blob = encode_info(&hierarchy, &key, &iv, false, true).unwrap();

    let ctx = decode_context(&hierarchy, &blob, false).unwrap().unwrap();
    assert_eq!(ctx.mode(), EncryptionMode::Aes);
    assert_eq!(ctx.key().unwrap().as_bytes(), key.as_bytes());
    assert_eq!(ctx.iv(), Some(&iv));
    assert_eq!(ctx.key_id(), 1);
    assert_eq!(ctx.key_id_uuid(), UUID);
}

#[test]
fn debug_redacts_key_material() {
    let (_keyring, hierarchy) = setup();
    let blob = encode_info(
        &hierarchy,
        &generate_random_key(),
        &generate_random_iv(),
        false,
        true,
    )
    .unwrap();
    let info = decode_info(&hierarchy, &blob, true, false).unwrap().unwrap();
    let debug = format!("{info:?}");
    assert!(debug.contains("[REDACTED]"));
}
