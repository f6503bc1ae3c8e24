//! KeyDir implementation
//!
//! HashMap-based index with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{CaskError, Result};

use super::Location;

/// In-memory key → location index
///
/// Performs no I/O. Lookups share the lock; `put`, `remove` and `clear` hold
/// it exclusively.
#[derive(Default)]
pub struct KeyDir {
    index: RwLock<HashMap<Vec<u8>, Location>>,
}

impl KeyDir {
    /// Create a new empty KeyDir
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the location of `key`, returning the previous one
    pub fn put(&self, key: Vec<u8>, location: Location) -> Option<Location> {
        self.index.write().insert(key, location)
    }

    /// Look up the location of `key`
    pub fn get(&self, key: &[u8]) -> Result<Location> {
        self.index
            .read()
            .get(key)
            .copied()
            .ok_or_else(|| CaskError::KeyNotFound(key.to_vec()))
    }

    /// Drop `key` from the index; a missing key is not an error
    pub fn remove(&self, key: &[u8]) -> Option<Location> {
        self.index.write().remove(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.read().contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Sorted snapshot of all live keys
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self.index.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove every key
    pub fn clear(&self) {
        self.index.write().clear();
    }
}
