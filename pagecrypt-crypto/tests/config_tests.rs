use pagecrypt_crypto::{CryptoError, EncryptionConfig, PageCodec};
use std::io::Write;
use tempfile::NamedTempFile;

const UUID: &str = "8a94f357-aab4-11df-86ab-c80aa9429562";

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn default_config_is_valid() {
    let config = EncryptionConfig::default();
    config.validate().unwrap();
    assert_eq!(config.page_size, 16384);
    assert_eq!(config.fs_block_size, 512);
    assert!(config.server_uuid.is_empty());
}

#[test]
fn load_from_file() {
    let file = write_config(&format!(
        "server_uuid = \"{UUID}\"\nserver_id = 3\npage_size = 8192\nfs_block_size = 4096\n"
    ));
    let config = EncryptionConfig::load_from(file.path()).unwrap();
    assert_eq!(config.server_uuid, UUID);
    assert_eq!(config.server_id, 3);
    assert_eq!(config.page_size, 8192);
    assert_eq!(config.fs_block_size, 4096);
    let codec = PageCodec::new(&config);
    assert_eq!(codec.fs_block_size(), 4096);
    assert_eq!(codec.page_size(), Some(8192));
}

#[test]
fn missing_fields_use_defaults() {
    let config = EncryptionConfig::from_toml(&format!("server_uuid = \"{UUID}\"")).unwrap();
    assert_eq!(config, EncryptionConfig::with_uuid(UUID));
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EncryptionConfig::load_from(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CryptoError::Config(_)));
}

#[test]
fn malformed_toml_is_config_error() {
    let file = write_config("page_size = \"big\"");
    assert!(matches!(
        EncryptionConfig::load_from(file.path()),
        Err(CryptoError::Config(_))
    ));
}

#[test]
fn rejects_invalid_uuid() {
    assert!(EncryptionConfig::from_toml("server_uuid = \"not-a-uuid\"").is_err());
    let simple = "8a94f357aab411df86abc80aa9429562";
    assert!(EncryptionConfig::with_uuid(simple).validate().is_err());
}

#[test]
fn rejects_bad_sizes() {
    let odd_page = EncryptionConfig {
        page_size: 3000,
        ..EncryptionConfig::default()
    };
    assert!(odd_page.validate().is_err());

    let tiny_page = EncryptionConfig {
        page_size: 512,
        ..EncryptionConfig::default()
    };
    assert!(tiny_page.validate().is_err());

    let big_block = EncryptionConfig {
        page_size: 4096,
        fs_block_size: 8192,
        ..EncryptionConfig::default()
    };
    assert!(big_block.validate().is_err());
}

#[test]
fn codec_from_default_config() {
    let config = EncryptionConfig::default();
    assert_eq!(
        PageCodec::default().with_page_size(config.page_size),
        PageCodec::new(&config)
    );
    assert_eq!(PageCodec::default().page_size(), None);
}
