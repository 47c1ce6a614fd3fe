//! Contains a concrete implementation of the [KeyValueStore] trait that stores data in memory.

use crate::{BatchOp, KeyValueStore, StoreMetrics, StoreResult};
use std::collections::BTreeMap;

/// A simple, synchronous key-value store that stores data in memory. The
/// backing [BTreeMap] yields ordered iteration natively; snapshots are
/// point-in-time clones.
#[derive(Default, Clone, Debug, Eq, PartialEq)]
pub struct MemoryStore {
    store: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create a new [MemoryStore] with an empty store.
    pub const fn new() -> Self {
        Self { store: BTreeMap::new() }
    }

    /// Returns the number of entries in the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.store.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.store.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.store.remove(key);
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.store.contains_key(key))
    }

    fn iter<'a>(&'a self, _ordered: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        Box::new(self.store.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    fn snapshot(&self) -> StoreResult<Box<dyn KeyValueStore>> {
        Ok(Box::new(self.clone()))
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> StoreResult<()> {
        for op in ops {
            match op {
                BatchOp::Put(key, value) => {
                    self.store.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    self.store.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.store.clear();
        Ok(())
    }

    fn gather_metrics(&self) -> StoreResult<StoreMetrics> {
        let bytes = self.store.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
        Ok(StoreMetrics { entries: self.store.len() as u64, bytes })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
