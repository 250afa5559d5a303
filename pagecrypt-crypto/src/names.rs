//! Keyring name templates.
//!
//! These strings are shared with every other reader of the same keyring and
//! must stay byte-exact.

/// Prefix of master key names.
pub const MASTER_KEY_PREFIX: &str = "INNODBKey";

/// Prefix of per-tablespace keyring keys.
pub const TABLESPACE_KEY_PREFIX: &str = "percona_innodb";

/// Prefix of redo log keys.
pub const REDO_KEY_PREFIX: &str = "percona_redo";

/// Key fetched or generated to prove the keyring is alive.
pub const KEYRING_TEST_KEY: &str = "percona_keyring_test";

/// Bootstrap master key, zero padded to the key length.
pub const DEFAULT_MASTER_KEY: &str = "DefaultMasterKey";

/// `INNODBKey-<uuid>-<id>`
#[must_use]
pub fn master_key_name(uuid: &str, id: u32) -> String {
    format!("{MASTER_KEY_PREFIX}-{uuid}-{id}")
}

/// `INNODBKey-<server_id>-<id>`, written by servers that predate uuids.
#[must_use]
pub fn legacy_master_key_name(server_id: u64, id: u32) -> String {
    format!("{MASTER_KEY_PREFIX}-{server_id}-{id}")
}

/// `percona_innodb-<key_id>-<uuid>`
#[must_use]
pub fn tablespace_key_name(key_id: u32, uuid: &str) -> String {
    format!("{TABLESPACE_KEY_PREFIX}-{key_id}-{uuid}")
}

/// `percona_innodb-<key_id>-<uuid>:<version>`
#[must_use]
pub fn tablespace_key_version_name(key_id: u32, uuid: &str, version: u32) -> String {
    format!("{TABLESPACE_KEY_PREFIX}-{key_id}-{uuid}:{version}")
}

/// `percona_redo-<uuid>`
#[must_use]
pub fn redo_key_name(uuid: &str) -> String {
    format!("{REDO_KEY_PREFIX}-{uuid}")
}

/// `percona_redo-<uuid>:<version>`
#[must_use]
pub fn redo_key_version_name(uuid: &str, version: u32) -> String {
    format!("{REDO_KEY_PREFIX}-{uuid}:{version}")
}
