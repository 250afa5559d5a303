use pagecrypt_types::layout::*;
use pagecrypt_types::{
    EncryptionMode, LayoutError, LogBlockView, LogBlockViewMut, PageType, PageView, PageViewMut,
    RotationMode,
};

// ── constants ────────────────────────────────────────────────────

#[test]
fn header_fields_do_not_overlap() {
    assert_eq!(FIL_PAGE_VERSION, 26);
    assert_eq!(FIL_PAGE_ALGORITHM_V1, 27);
    assert_eq!(FIL_PAGE_ORIGINAL_TYPE_V1, 28);
    assert_eq!(FIL_PAGE_ORIGINAL_SIZE_V1, 30);
    assert_eq!(FIL_PAGE_COMPRESS_SIZE_V1, 32);
    assert_eq!(FIL_PAGE_ENCRYPTION_KEY_VERSION, 30);
    assert_eq!(FIL_PAGE_SPACE_ID, 34);
    assert_eq!(FIL_PAGE_DATA, 38);
}

#[test]
fn compressed_keyring_footprint_follows_header() {
    assert_eq!(FIL_PAGE_KEYRING_CHECKSUM_COMPRESSED, 38);
    assert_eq!(FIL_PAGE_KEYRING_VERSION_COMPRESSED, 42);
    assert_eq!(
        FIL_PAGE_DATA + KEYRING_COMPRESSED_FOOTPRINT,
        FIL_PAGE_KEYRING_VERSION_COMPRESSED + 4
    );
}

#[test]
fn log_block_geometry() {
    assert_eq!(LOG_BLOCK_CHECKSUM, 508);
    assert_eq!(LOG_BLOCK_SIZE - LOG_BLOCK_HDR_SIZE - LOG_BLOCK_TRL_SIZE, 496);
}

// ── PageType ─────────────────────────────────────────────────────

#[test]
fn page_type_known_values() {
    assert_eq!(PageType::from_u16(0), PageType::Allocated);
    assert_eq!(PageType::from_u16(8), PageType::FspHdr);
    assert_eq!(PageType::from_u16(9), PageType::Xdes);
    assert_eq!(PageType::from_u16(14), PageType::Compressed);
    assert_eq!(PageType::from_u16(15), PageType::Encrypted);
    assert_eq!(PageType::from_u16(16), PageType::CompressedAndEncrypted);
    assert_eq!(PageType::from_u16(17), PageType::EncryptedRtree);
    assert_eq!(PageType::from_u16(17854), PageType::Rtree);
    assert_eq!(PageType::from_u16(17855), PageType::Index);
}

#[test]
fn unknown_page_type_is_preserved() {
    let ty = PageType::from_u16(4242);
    assert_eq!(ty, PageType::Other(4242));
    assert_eq!(ty.as_u16(), 4242);
    assert_eq!(ty.to_string(), "Other(4242)");
}

#[test]
fn only_markers_are_encrypted() {
    assert!(PageType::Encrypted.is_encrypted());
    assert!(PageType::CompressedAndEncrypted.is_encrypted());
    assert!(PageType::EncryptedRtree.is_encrypted());
    assert!(!PageType::Index.is_encrypted());
    assert!(!PageType::Compressed.is_encrypted());
    assert!(!PageType::Rtree.is_encrypted());
}

#[test]
fn bootstrap_plaintext_types() {
    assert!(PageType::FspHdr.is_bootstrap_plaintext());
    assert!(PageType::Xdes.is_bootstrap_plaintext());
    assert!(PageType::Rtree.is_bootstrap_plaintext());
    assert!(!PageType::Index.is_bootstrap_plaintext());
    assert!(!PageType::Allocated.is_bootstrap_plaintext());
}

#[test]
fn page_type_display_uses_names() {
    assert_eq!(PageType::Index.to_string(), "Index");
    assert_eq!(PageType::CompressedAndEncrypted.to_string(), "CompressedAndEncrypted");
}

// ── modes ────────────────────────────────────────────────────────

#[test]
fn mode_names() {
    assert_eq!(EncryptionMode::None.as_str(), "N");
    assert_eq!(EncryptionMode::Aes.as_str(), "Y");
    assert_eq!(EncryptionMode::Keyring.as_str(), "KEYRING");
    assert_eq!(EncryptionMode::Keyring.to_string(), "KEYRING");
}

#[test]
fn mode_parse_accepts_aliases() {
    assert_eq!("y".parse::<EncryptionMode>().unwrap(), EncryptionMode::Aes);
    assert_eq!("aes".parse::<EncryptionMode>().unwrap(), EncryptionMode::Aes);
    assert_eq!("none".parse::<EncryptionMode>().unwrap(), EncryptionMode::None);
    assert_eq!(
        "Keyring".parse::<EncryptionMode>().unwrap(),
        EncryptionMode::Keyring
    );
}

#[test]
fn mode_parse_rejects_unknown() {
    let err = "rot13".parse::<EncryptionMode>().unwrap_err();
    assert_eq!(err, LayoutError::UnknownMode("rot13".into()));
}

#[test]
fn mode_defaults() {
    assert_eq!(EncryptionMode::default(), EncryptionMode::None);
    assert!(!EncryptionMode::None.is_active());
    assert!(EncryptionMode::Aes.is_active());
    assert_eq!(RotationMode::default(), RotationMode::None);
}

// ── PageView ─────────────────────────────────────────────────────

#[test]
fn page_view_rejects_bad_sizes() {
    let small = vec![0u8; MIN_PAGE_SIZE - 1];
    assert!(matches!(
        PageView::new(&small),
        Err(LayoutError::PageTooSmall { .. })
    ));
    let large = vec![0u8; MAX_PAGE_SIZE + 1];
    assert!(matches!(
        PageView::new(&large),
        Err(LayoutError::PageTooLarge { .. })
    ));
    let mut odd = vec![0u8; 1500];
    assert_eq!(
        PageView::new(&odd).unwrap_err(),
        LayoutError::PageSizeNotPowerOfTwo { len: 1500 }
    );
    assert!(PageViewMut::new(&mut odd).is_err());
}

#[test]
fn page_view_mut_setters_are_visible_through_view() {
    let mut buf = vec![0u8; DEFAULT_PAGE_SIZE];
    {
        let mut page = PageViewMut::new(&mut buf).unwrap();
        page.set_page_no(7);
        page.set_space_id(99);
        page.set_lsn(0x0102_0304_0506_0708);
        page.set_page_type(PageType::Index);
        page.set_original_type(PageType::Sdi.as_u16());
        page.set_key_version(5);
    }
    let view = PageView::new(&buf).unwrap();
    assert_eq!(view.page_no(), 7);
    assert_eq!(view.space_id(), 99);
    assert_eq!(view.lsn(), 0x0102_0304_0506_0708);
    assert_eq!(view.trailer_low_word(), 0x0506_0708);
    assert_eq!(view.page_type(), PageType::Index);
    assert_eq!(view.original_type(), PageType::Sdi.as_u16());
    assert_eq!(view.key_version(), 5);
    assert!(!view.is_encrypted());
}

#[test]
fn compression_header_fields() {
    let mut buf = vec![0u8; 4096];
    let mut page = PageViewMut::new(&mut buf).unwrap();
    page.set_page_type(PageType::Compressed);
    page.set_compression_version(COMPRESSION_VERSION_2);
    page.set_compressed_size(100);
    page.set_compressed_key_version(3);
    let view = page.as_view();
    assert_eq!(view.compression_version(), 2);
    assert_eq!(view.compressed_size(), 100);
    assert_eq!(view.compressed_key_version(), 3);
    assert_eq!(&buf[32..34], &[0, 100]);
}

#[test]
fn fields_are_big_endian() {
    let mut buf = vec![0u8; 1024];
    let mut page = PageViewMut::new(&mut buf).unwrap();
    page.set_page_type(PageType::Index);
    assert_eq!(&buf[24..26], &[0x45, 0xBF]);
}

// ── LogBlockView ─────────────────────────────────────────────────

#[test]
fn log_block_requires_exact_size() {
    let buf = vec![0u8; 511];
    assert_eq!(
        LogBlockView::new(&buf).unwrap_err(),
        LayoutError::LogBlockSize {
            expected: 512,
            actual: 511
        }
    );
}

#[test]
fn encrypt_bit_is_independent_of_data_len() {
    let mut buf = vec![0u8; LOG_BLOCK_SIZE];
    let mut block = LogBlockViewMut::new(&mut buf).unwrap();
    block.set_data_len(300);
    block.set_encrypted(true);
    assert!(block.as_view().is_encrypted());
    assert_eq!(block.as_view().data_len(), 300);

    block.set_data_len(12);
    assert!(block.as_view().is_encrypted());
    block.set_encrypted(false);
    assert!(!block.as_view().is_encrypted());
    assert_eq!(block.as_view().data_len(), 12);
}

#[test]
fn flush_bit_is_masked_from_block_no() {
    let mut buf = vec![0u8; LOG_BLOCK_SIZE];
    let mut block = LogBlockViewMut::new(&mut buf).unwrap();
    block.set_block_no(1234, true);
    let view = block.as_view();
    assert_eq!(view.block_no(), 1234);
    assert!(view.is_flush_start());
}

#[test]
fn update_checksum_matches_calculation() {
    let mut buf = vec![0xA5u8; LOG_BLOCK_SIZE];
    let mut block = LogBlockViewMut::new(&mut buf).unwrap();
    block.set_checkpoint_no(9);
    block.set_first_rec_group(12);
    block.update_checksum();
    let view = block.as_view();
    assert_eq!(view.stored_checksum(), view.calculate_checksum());
    assert_eq!(view.calculate_checksum(), crc32c::crc32c(&buf[..508]));
}

#[test]
fn checksum_ignores_trailer() {
    let mut buf = vec![1u8; LOG_BLOCK_SIZE];
    let before = LogBlockView::new(&buf).unwrap().calculate_checksum();
    buf[510] = 0xFF;
    let after = LogBlockView::new(&buf).unwrap().calculate_checksum();
    assert_eq!(before, after);
}

// ============================================================================
// Property tests
// ============================================================================

mod page_type_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn raw_value_survives_decode(raw in any::<u16>()) {
            prop_assert_eq!(PageType::from_u16(raw).as_u16(), raw);
        }
    }
}
