//! Contains the [ReadOnlyOverlay], a mutable in-memory layer composed over a base store.

use crate::{KeyValueStore, MemoryStore, StoreMetrics, StoreResult};
use std::collections::{BTreeMap, BTreeSet};

/// A mutable in-memory overlay over a read-only base store.
///
/// Writes land in the overlay; reads cascade overlay-then-base. Deletions are
/// recorded as tombstones so that base entries appear removed without touching
/// the base. [Self::clear_temp_changes] discards the overlay wholesale.
#[derive(Debug, Clone)]
pub struct ReadOnlyOverlay<S> {
    base: S,
    overlay: BTreeMap<Vec<u8>, Vec<u8>>,
    tombstones: BTreeSet<Vec<u8>>,
}

impl<S> ReadOnlyOverlay<S>
where
    S: KeyValueStore,
{
    /// Creates a new [ReadOnlyOverlay] over the given base store.
    pub const fn new(base: S) -> Self {
        Self { base, overlay: BTreeMap::new(), tombstones: BTreeSet::new() }
    }

    /// Discards every change recorded in the overlay, exposing the base as-is.
    pub fn clear_temp_changes(&mut self) {
        self.overlay.clear();
        self.tombstones.clear();
    }

    /// Returns `true` if the overlay holds no pending changes.
    pub fn is_pristine(&self) -> bool {
        self.overlay.is_empty() && self.tombstones.is_empty()
    }

    /// Consumes the overlay, returning the untouched base store.
    pub fn into_base(self) -> S {
        self.base
    }
}

impl<S> KeyValueStore for ReadOnlyOverlay<S>
where
    S: KeyValueStore,
{
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if self.tombstones.contains(key) {
            return Ok(None);
        }
        if let Some(value) = self.overlay.get(key) {
            return Ok(Some(value.clone()));
        }
        self.base.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tombstones.remove(key);
        self.overlay.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.overlay.remove(key);
        if self.base.contains(key)? {
            self.tombstones.insert(key.to_vec());
        }
        Ok(())
    }

    fn iter<'a>(&'a self, ordered: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        // Materialize the merged view. The overlay shadows the base and
        // tombstones hide base entries.
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .base
            .iter(ordered)
            .filter(|(k, _)| !self.tombstones.contains(k))
            .collect();
        for (k, v) in &self.overlay {
            merged.insert(k.clone(), v.clone());
        }
        Box::new(merged.into_iter())
    }

    fn snapshot(&self) -> StoreResult<Box<dyn KeyValueStore>> {
        let mut flat = MemoryStore::new();
        for (k, v) in self.iter(true) {
            flat.put(&k, &v)?;
        }
        Ok(Box::new(flat))
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.overlay.clear();
        let base_keys = self.base.iter(false).map(|(k, _)| k).collect::<Vec<_>>();
        self.tombstones.extend(base_keys);
        Ok(())
    }

    fn gather_metrics(&self) -> StoreResult<StoreMetrics> {
        let mut metrics = StoreMetrics::default();
        for (k, v) in self.iter(false) {
            metrics.entries += 1;
            metrics.bytes += (k.len() + v.len()) as u64;
        }
        Ok(metrics)
    }

    fn name(&self) -> &'static str {
        "overlay"
    }
}
