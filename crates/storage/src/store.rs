//! In-memory key-value store.

use crate::{Error, Event, EventKind, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// The queryable state of the service.
///
/// Writers take the lock exclusively, readers share it; every operation holds
/// it for a single map access.
#[derive(Debug, Default)]
pub struct Store {
    entries: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, overwriting any previous value.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Look up `key`.
    pub fn get(&self, key: &str) -> Result<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Apply a persisted event.
    pub fn apply(&self, event: &Event) {
        match event.kind {
            EventKind::Put => self.put(event.key.as_str(), event.value.as_str()),
            EventKind::Delete => self.delete(&event.key),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
