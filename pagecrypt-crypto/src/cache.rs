//! Historical key versions.

use crate::error::CryptoResult;
use crate::key::EncryptionKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Map from key version to key, shared between clones of a context.
///
/// Readers never block each other. A key is inserted only once it is fully
/// fetched, so a reader sees either nothing or the complete key. The first
/// key published for a version wins.
#[derive(Debug, Default)]
pub struct KeyVersionCache {
    keys: RwLock<HashMap<u32, Arc<EncryptionKey>>>,
}

impl KeyVersionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, version: u32) -> Option<Arc<EncryptionKey>> {
        self.keys.read().get(&version).cloned()
    }

    /// Publishes `key` for `version` and returns the key now cached for it.
    pub fn insert(&self, version: u32, key: Arc<EncryptionKey>) -> Arc<EncryptionKey> {
        self.keys.write().entry(version).or_insert(key).clone()
    }

    /// Returns the cached key, or fetches and publishes it.
    ///
    /// `fetch` runs without the lock held, so concurrent misses may fetch
    /// the same version twice; only one result is kept.
    pub fn get_or_try_insert_with<F>(&self, version: u32, fetch: F) -> CryptoResult<Arc<EncryptionKey>>
    where
        F: FnOnce() -> CryptoResult<EncryptionKey>,
    {
        if let Some(key) = self.get(version) {
            return Ok(key);
        }
        let key = Arc::new(fetch()?);
        Ok(self.insert(version, key))
    }

    #[must_use]
    pub fn contains(&self, version: u32) -> bool {
        self.keys.read().contains_key(&version)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Drops every cached key.
    pub fn clear(&self) {
        self.keys.write().clear();
    }
}
