//! Contains a write-swallowing [KeyValueStore] backend for dry runs and tests.

use crate::{KeyValueStore, StoreMetrics, StoreResult};

/// A backend that silently swallows writes and returns empty for all reads.
#[derive(Default, Clone, Copy, Debug, Eq, PartialEq)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&mut self, _key: &[u8], _value: &[u8]) -> StoreResult<()> {
        Ok(())
    }

    fn delete(&mut self, _key: &[u8]) -> StoreResult<()> {
        Ok(())
    }

    fn iter<'a>(&'a self, _ordered: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        Box::new(core::iter::empty())
    }

    fn snapshot(&self) -> StoreResult<Box<dyn KeyValueStore>> {
        Ok(Box::new(Self))
    }

    fn clear(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn gather_metrics(&self) -> StoreResult<StoreMetrics> {
        Ok(StoreMetrics::default())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_swallows_writes() {
        let mut store = NullStore;
        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
        assert!(!store.contains(b"k").unwrap());
        assert_eq!(store.iter(true).count(), 0);
    }
}
