//! Master, tablespace and redo log key management.
//!
//! [`KeyHierarchy`] owns the process-wide master key identity (id + uuid of
//! the server that created it). Master keys wrap per-tablespace key/iv pairs
//! in encryption info blobs. Tablespace and redo log keys used by keyring
//! encryption are system keys, versioned by the keyring itself.
//!
//! The master key id only moves forward: it advances on first creation, on
//! rotation, and when a blob written under a newer master key is decoded.

use crate::cache::KeyVersionCache;
use crate::config::EncryptionConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{EncryptionKey, KEY_LEN};
use crate::names::{
    DEFAULT_MASTER_KEY, KEYRING_TEST_KEY, legacy_master_key_name, master_key_name,
    redo_key_name, redo_key_version_name, tablespace_key_name, tablespace_key_version_name,
};
use pagecrypt_keyring::{ALGORITHM_AES, Keyring, KeyringError, Zeroizing, parse_system_key};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Master key id meaning "no master key created yet".
pub const DEFAULT_MASTER_KEY_ID: u32 = 0;

#[derive(Debug, Default)]
struct MasterKeyState {
    id: u32,
    uuid: String,
}

/// Resolves and creates keys through a keyring.
pub struct KeyHierarchy {
    keyring: Arc<dyn Keyring>,
    server_uuid: String,
    server_id: u64,
    master: Mutex<MasterKeyState>,
    default_master_key_used: AtomicBool,
    keyring_checked: AtomicBool,
    redo_keys: Mutex<HashMap<String, Arc<KeyVersionCache>>>,
}

impl KeyHierarchy {
    /// Creates a hierarchy over `keyring` for the server described by `config`.
    pub fn new(keyring: Arc<dyn Keyring>, config: &EncryptionConfig) -> Self {
        Self {
            keyring,
            server_uuid: config.server_uuid.clone(),
            server_id: config.server_id,
            master: Mutex::new(MasterKeyState::default()),
            default_master_key_used: AtomicBool::new(false),
            keyring_checked: AtomicBool::new(false),
            redo_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the underlying keyring.
    #[must_use]
    pub fn keyring(&self) -> &Arc<dyn Keyring> {
        &self.keyring
    }

    /// Returns this server's uuid, empty before one is generated.
    #[must_use]
    pub fn server_uuid(&self) -> &str {
        &self.server_uuid
    }

    /// Returns the numeric server id used by legacy key names.
    #[must_use]
    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Current process-wide master key id.
    #[must_use]
    pub fn master_key_id(&self) -> u32 {
        self.master.lock().id
    }

    /// Uuid of the server that created the current master key.
    #[must_use]
    pub fn master_key_uuid(&self) -> String {
        self.master.lock().uuid.clone()
    }

    /// True once a blob has been written with the bootstrap master key.
    #[must_use]
    pub fn default_master_key_used(&self) -> bool {
        self.default_master_key_used.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_default_master_key_used(&self) {
        self.default_master_key_used.store(true, Ordering::SeqCst);
    }

    /// Forgets the master key identity and all cached redo keys.
    pub fn reset(&self) {
        *self.master.lock() = MasterKeyState::default();
        self.default_master_key_used.store(false, Ordering::SeqCst);
        self.keyring_checked.store(false, Ordering::SeqCst);
        self.redo_keys.lock().clear();
    }

    fn fetch(&self, name: &str) -> CryptoResult<Zeroizing<Vec<u8>>> {
        match self.keyring.fetch(name) {
            Ok(value) => Ok(value),
            Err(KeyringError::NotFound(_)) => {
                debug!(name, "key not in keyring");
                Err(CryptoError::KeyNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn generate(&self, name: &str) -> CryptoResult<()> {
        self.keyring
            .generate(name, ALGORITHM_AES, KEY_LEN)
            .map_err(CryptoError::from)
    }

    /// Fetches an unversioned system key and splits off its version.
    fn fetch_latest_system_key(&self, name: &str) -> CryptoResult<(u32, EncryptionKey)> {
        let value = self.fetch(name)?;
        let (version, bytes) = parse_system_key(&value)?;
        let key = EncryptionKey::from_slice(bytes)?.with_version(version);
        Ok((version, key))
    }

    // ── master keys ─────────────────────────────────────────────

    /// Returns the current master key, creating master key 1 on first use.
    ///
    /// Creation is check-then-create under the master key lock, so racing
    /// callers all observe the same key 1.
    pub fn create_master_key_if_absent(&self) -> CryptoResult<(u32, EncryptionKey)> {
        let mut state = self.master.lock();

        if state.id == DEFAULT_MASTER_KEY_ID {
            let uuid = self.server_uuid.clone();
            let name = master_key_name(&uuid, 1);
            if let Err(e) = self.generate(&name) {
                warn!(name = %name, error = %e, "master key generation failed, trying to fetch it");
            }
            let value = self.fetch(&name).inspect_err(|_| {
                error!("Encryption can't find master key, please check the keyring is loaded");
            })?;
            let key = EncryptionKey::from_slice(&value)?.with_id(1).with_uuid(&uuid);
            state.id = 1;
            state.uuid = uuid;
            info!(master_key_id = 1, "created first master key");
            return Ok((1, key));
        }

        let id = state.id;
        let uuid = state.uuid.clone();
        drop(state);

        let value = match self.fetch(&master_key_name(&uuid, id)) {
            Ok(value) => value,
            Err(e) if e.is_key_not_found() => {
                let legacy = legacy_master_key_name(self.server_id, id);
                warn!(name = %legacy, "master key not found by uuid, trying legacy name");
                self.fetch(&legacy)?
            }
            Err(e) => return Err(e),
        };
        let key = EncryptionKey::from_slice(&value)?.with_id(id).with_uuid(uuid);
        Ok((id, key))
    }

    /// Fetches master key `id`. Without a uuid the legacy name is used.
    pub fn get_master_key(&self, id: u32, uuid: Option<&str>) -> CryptoResult<EncryptionKey> {
        let name = match uuid {
            Some(uuid) => master_key_name(uuid, id),
            None => legacy_master_key_name(self.server_id, id),
        };
        let value = self.fetch(&name).inspect_err(|e| {
            error!(name = %name, error = %e, "Encryption can't find master key");
        })?;
        let key = EncryptionKey::from_slice(&value)?
            .with_id(id)
            .with_uuid(uuid.unwrap_or_default());
        Ok(key)
    }

    /// Generates the next master key under this server's uuid and makes it
    /// current.
    pub fn rotate_master_key(&self) -> CryptoResult<(u32, EncryptionKey)> {
        let mut state = self.master.lock();
        let id = state.id + 1;
        let uuid = self.server_uuid.clone();
        let name = master_key_name(&uuid, id);
        if let Err(e) = self.generate(&name) {
            warn!(name = %name, error = %e, "master key generation failed, trying to fetch it");
        }
        let value = self.fetch(&name)?;
        let key = EncryptionKey::from_slice(&value)?.with_id(id).with_uuid(&uuid);
        state.id = id;
        state.uuid = uuid;
        info!(master_key_id = id, "rotated master key");
        Ok((id, key))
    }

    /// Advances the master key identity if `id` is newer than the current one.
    pub fn observe_master_key(&self, id: u32, uuid: &str) {
        let mut state = self.master.lock();
        if state.id < id {
            debug!(from = state.id, to = id, "advancing master key id");
            state.id = id;
            state.uuid = uuid.to_string();
        }
    }

    // ── tablespace keys ─────────────────────────────────────────

    pub fn get_latest_tablespace_key(
        &self,
        key_id: u32,
        uuid: &str,
    ) -> CryptoResult<(u32, EncryptionKey)> {
        let (version, key) = self.fetch_latest_system_key(&tablespace_key_name(key_id, uuid))?;
        Ok((version, key.with_id(key_id).with_uuid(uuid)))
    }

    pub fn get_specific_tablespace_version(
        &self,
        key_id: u32,
        uuid: &str,
        version: u32,
    ) -> CryptoResult<EncryptionKey> {
        let name = tablespace_key_version_name(key_id, uuid, version);
        let value = self.fetch(&name).inspect_err(|_| {
            error!(key_id, version, "Encryption can't find tablespace key");
        })?;
        Ok(EncryptionKey::from_slice(&value)?
            .with_id(key_id)
            .with_version(version)
            .with_uuid(uuid))
    }

    /// Generates a tablespace key and returns its newest version.
    pub fn create_tablespace_key(
        &self,
        key_id: u32,
        uuid: &str,
    ) -> CryptoResult<(u32, EncryptionKey)> {
        let name = tablespace_key_name(key_id, uuid);
        self.generate(&name).inspect_err(|e| {
            error!(name = %name, error = %e, "Encryption can't generate tablespace key");
        })?;
        let (version, key) = self.get_latest_tablespace_key(key_id, uuid)?;
        info!(key_id, version, "created tablespace key");
        Ok((version, key))
    }

    pub fn get_or_create_latest_tablespace_key(
        &self,
        key_id: u32,
        uuid: &str,
    ) -> CryptoResult<(u32, EncryptionKey)> {
        match self.get_latest_tablespace_key(key_id, uuid) {
            Err(e) if e.is_key_not_found() => self.create_tablespace_key(key_id, uuid),
            other => other,
        }
    }

    pub fn tablespace_key_exists(&self, key_id: u32, uuid: &str) -> CryptoResult<bool> {
        match self.get_latest_tablespace_key(key_id, uuid) {
            Ok(_) => Ok(true),
            Err(e) if e.is_key_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Newest version of a tablespace key, or `None` if it does not exist.
    pub fn latest_tablespace_key_version(
        &self,
        key_id: u32,
        uuid: &str,
    ) -> CryptoResult<Option<u32>> {
        match self.get_latest_tablespace_key(key_id, uuid) {
            Ok((version, _)) => Ok(Some(version)),
            Err(e) if e.is_key_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Adds a new version of an existing tablespace key.
    pub fn rotate_tablespace_key(
        &self,
        key_id: u32,
        uuid: &str,
    ) -> CryptoResult<(u32, EncryptionKey)> {
        if !self.tablespace_key_exists(key_id, uuid)? {
            return Err(CryptoError::KeyNotFound(tablespace_key_name(key_id, uuid)));
        }
        self.create_tablespace_key(key_id, uuid)
    }

    // ── redo log keys ───────────────────────────────────────────

    fn redo_cache(&self, uuid: &str) -> Arc<KeyVersionCache> {
        self.redo_keys
            .lock()
            .entry(uuid.to_string())
            .or_default()
            .clone()
    }

    /// Returns the newest redo log key version and caches it.
    pub fn get_latest_redo_key(&self, uuid: &str) -> CryptoResult<(u32, Arc<EncryptionKey>)> {
        let (version, key) = self.fetch_latest_system_key(&redo_key_name(uuid))?;
        let key = self
            .redo_cache(uuid)
            .insert(version, Arc::new(key.with_uuid(uuid)));
        Ok((version, key))
    }

    /// Returns redo key `version`, fetching it on the first request.
    pub fn get_redo_key_version(&self, uuid: &str, version: u32) -> CryptoResult<Arc<EncryptionKey>> {
        self.redo_cache(uuid).get_or_try_insert_with(version, || {
            let value = self.fetch(&redo_key_version_name(uuid, version))?;
            debug!(version, "loaded redo log key version");
            Ok(EncryptionKey::from_slice(&value)?
                .with_version(version)
                .with_uuid(uuid))
        })
    }

    /// Returns the newest redo log key, generating the first one if needed.
    pub fn get_or_create_redo_key(&self, uuid: &str) -> CryptoResult<(u32, Arc<EncryptionKey>)> {
        match self.get_latest_redo_key(uuid) {
            Err(e) if e.is_key_not_found() => {
                self.generate(&redo_key_name(uuid))?;
                info!("created redo log key");
                self.get_latest_redo_key(uuid)
            }
            other => other,
        }
    }

    /// Adds a new redo log key version and returns it.
    pub fn rotate_redo_key(&self, uuid: &str) -> CryptoResult<(u32, Arc<EncryptionKey>)> {
        self.generate(&redo_key_name(uuid))?;
        let (version, key) = self.get_latest_redo_key(uuid)?;
        info!(version, "rotated redo log key");
        Ok((version, key))
    }

    // ── keyring health ──────────────────────────────────────────

    /// Fetches the keyring test key, creating it if absent.
    pub fn is_keyring_alive(&self) -> bool {
        if self.keyring.fetch(KEYRING_TEST_KEY).is_ok() {
            return true;
        }
        self.generate(KEYRING_TEST_KEY).is_ok()
    }

    /// Verifies the keyring can serve master keys.
    ///
    /// Before the first master key exists a probe key is generated, fetched
    /// and removed once; afterwards the current master key is fetched.
    pub fn check_keyring(&self) -> CryptoResult<()> {
        if self.master_key_id() == DEFAULT_MASTER_KEY_ID {
            if self.keyring_checked.load(Ordering::SeqCst) {
                return Ok(());
            }
            if let Err(e) = self.generate(DEFAULT_MASTER_KEY) {
                debug!(error = %e, "keyring probe generation failed");
            }
            self.fetch(DEFAULT_MASTER_KEY).inspect_err(|_| {
                error!("Check keyring fail, please check the keyring is loaded");
            })?;
            if let Err(e) = self.keyring.remove(DEFAULT_MASTER_KEY) {
                warn!(error = %e, "failed to remove keyring probe key");
            }
            self.keyring_checked.store(true, Ordering::SeqCst);
            return Ok(());
        }
        self.create_master_key_if_absent().map(|_| ())
    }
}

impl std::fmt::Debug for KeyHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.master.lock();
        f.debug_struct("KeyHierarchy")
            .field("server_uuid", &self.server_uuid)
            .field("server_id", &self.server_id)
            .field("master_key_id", &state.id)
            .field("master_key_uuid", &state.uuid)
            .finish()
    }
}
