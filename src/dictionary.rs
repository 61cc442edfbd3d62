//! The in-memory dictionary: a `HashMap` behind a readers-writer lock.
//!
//! Enumerations hand out fresh copies, never references into the map, so
//! callers are free to mutate what they receive. A poisoned lock surfaces as
//! [`KvdError::Locking`] instead of panicking the caller.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{KvdError, Result};

/// the mapping of keys to their stored value bytes
#[derive(Debug, Default)]
pub(crate) struct Dictionary {
    map: RwLock<HashMap<String, String>>,
}

impl Dictionary {
    pub(crate) fn new() -> Dictionary {
        Dictionary {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// shared access for reads and enumerations
    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.map
            .read()
            .map_err(|e| KvdError::Locking(format!("dictionary read lock poisoned: {}", e)))
    }

    /// exclusive access for mutations
    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.map
            .write()
            .map_err(|e| KvdError::Locking(format!("dictionary write lock poisoned: {}", e)))
    }

    /// the value stored under `key`, if any
    pub(crate) fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    /// an independent copy of the full mapping
    pub(crate) fn entries(&self) -> Result<HashMap<String, String>> {
        Ok(self.read()?.clone())
    }

    /// an independent copy of all keys, in no particular order
    pub(crate) fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// an independent copy of all values, in no particular order
    pub(crate) fn values(&self) -> Result<Vec<String>> {
        Ok(self.read()?.values().cloned().collect())
    }

    /// number of entries currently stored
    pub(crate) fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// replaces the entire mapping, used when loading a snapshot
    pub(crate) fn replace(&self, entries: HashMap<String, String>) -> Result<()> {
        *self.write()? = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_are_independent_of_the_map() {
        let dict = Dictionary::new();
        dict.write().unwrap().insert("a".to_string(), "1".to_string());

        let mut entries = dict.entries().unwrap();
        entries.insert("b".to_string(), "2".to_string());
        let mut keys = dict.keys().unwrap();
        keys.push("c".to_string());

        assert_eq!(dict.len().unwrap(), 1);
        assert_eq!(dict.get("b").unwrap(), None);
        assert_eq!(dict.get("c").unwrap(), None);
    }

    #[test]
    fn replace_swaps_the_whole_mapping() {
        let dict = Dictionary::new();
        dict.write().unwrap().insert("old".to_string(), "1".to_string());

        let mut fresh = HashMap::new();
        fresh.insert("new".to_string(), "2".to_string());
        dict.replace(fresh).unwrap();

        assert_eq!(dict.get("old").unwrap(), None);
        assert_eq!(dict.get("new").unwrap(), Some("2".to_string()));
    }
}
