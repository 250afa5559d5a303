//! In-process keyring.
//!
//! Behaves like a real keyring service: system keys are versioned, other
//! names are write-once. Used by tests and by offline tooling that is handed
//! key material directly.

use crate::{
    ALGORITHM_AES, Keyring, KeyringError, KeyringResult, format_system_key, is_system_key,
    split_versioned_name,
};
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;
use zeroize::Zeroizing;

fn is_bare_system_name(name: &str) -> bool {
    is_system_key(name) && split_versioned_name(name).is_none()
}

#[derive(Default)]
struct Store {
    keys: HashMap<String, Zeroizing<Vec<u8>>>,
    latest_versions: HashMap<String, u32>,
}

/// Keyring backed by a process-local map.
pub struct MemoryKeyring {
    store: Mutex<Store>,
    available: AtomicBool,
    generate_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryKeyring {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            available: AtomicBool::new(true),
            generate_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Stores `value` under `name` verbatim, replacing any previous value.
    ///
    /// Inserting `"<system name>:<version>"` also registers that version so
    /// the bare name resolves to the highest one inserted.
    pub fn insert(&self, name: &str, value: &[u8]) {
        let mut store = self.store.lock();
        if let Some((base, version)) = split_versioned_name(name) {
            if is_system_key(base) {
                let latest = store.latest_versions.entry(base.to_string()).or_insert(0);
                *latest = (*latest).max(version);
            }
        }
        store
            .keys
            .insert(name.to_string(), Zeroizing::new(value.to_vec()));
    }

    /// Simulates the backend being unloaded (`false`) or reloaded (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// True if a value is stored under exactly `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let store = self.store.lock();
        if is_bare_system_name(name) {
            return store.latest_versions.contains_key(name);
        }
        store.keys.contains_key(name)
    }

    /// Latest version of a system key, if any.
    #[must_use]
    pub fn latest_version(&self, name: &str) -> Option<u32> {
        self.store.lock().latest_versions.get(name).copied()
    }

    /// Number of `generate` calls received, successful or not.
    #[must_use]
    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls received, successful or not.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> KeyringResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KeyringError::Unavailable)
        }
    }
}

impl Default for MemoryKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyring")
            .field("keys", &self.store.lock().keys.len())
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish()
    }
}

impl Keyring for MemoryKeyring {
    fn generate(&self, name: &str, algorithm: &str, key_len: usize) -> KeyringResult<()> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        if !algorithm.eq_ignore_ascii_case(ALGORITHM_AES) {
            return Err(KeyringError::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let mut secret = Zeroizing::new(vec![0u8; key_len]);
        rand::rngs::OsRng.fill_bytes(&mut secret);

        let mut store = self.store.lock();
        if is_bare_system_name(name) {
            let latest = store.latest_versions.entry(name.to_string()).or_insert(0);
            *latest += 1;
            let version = *latest;
            store.keys.insert(format!("{name}:{version}"), secret);
            debug!(name, version, "generated system key version");
            return Ok(());
        }

        if store.keys.contains_key(name) {
            return Err(KeyringError::AlreadyExists(name.to_string()));
        }
        store.keys.insert(name.to_string(), secret);
        debug!(name, "generated key");
        Ok(())
    }

    fn fetch(&self, name: &str) -> KeyringResult<Zeroizing<Vec<u8>>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let store = self.store.lock();
        if is_bare_system_name(name) {
            let version = store
                .latest_versions
                .get(name)
                .copied()
                .ok_or_else(|| KeyringError::NotFound(name.to_string()))?;
            let key = store
                .keys
                .get(&format!("{name}:{version}"))
                .ok_or_else(|| KeyringError::NotFound(name.to_string()))?;
            return Ok(format_system_key(version, key));
        }

        store
            .keys
            .get(name)
            .cloned()
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }

    fn remove(&self, name: &str) -> KeyringResult<()> {
        self.ensure_available()?;

        let mut store = self.store.lock();
        if is_bare_system_name(name) {
            if store.latest_versions.remove(name).is_none() {
                return Err(KeyringError::NotFound(name.to_string()));
            }
            let prefix = format!("{name}:");
            store.keys.retain(|k, _| !k.starts_with(&prefix));
            return Ok(());
        }

        store
            .keys
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }
}
