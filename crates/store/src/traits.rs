//! Contains the [KeyValueStore] trait describing the capability set of a backend.

use crate::StoreResult;

/// A single operation within a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite the value under the key.
    Put(Vec<u8>, Vec<u8>),
    /// Remove the key, if present.
    Delete(Vec<u8>),
}

/// Point-in-time size information for a backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Number of live entries.
    pub entries: u64,
    /// Total size of keys and values in bytes.
    pub bytes: u64,
}

/// Describes the interface of a simple, synchronous key-value store.
///
/// Writes never silently succeed against a failing backend: every mutation
/// returns a [StoreResult] and backends must surface their failures as
/// [StoreError::Backend].
///
/// [StoreError::Backend]: crate::StoreError::Backend
pub trait KeyValueStore: Send + Sync {
    /// Get the value associated with the given key, or [None] if absent.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Set the value associated with the given key.
    fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove the key, if present. Removing an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Returns `true` if the key is present.
    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Get the value associated with the given key, failing with
    /// [StoreError::KeyNotFound] if it is absent.
    ///
    /// [StoreError::KeyNotFound]: crate::StoreError::KeyNotFound
    fn require(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.get(key)?.ok_or(crate::StoreError::KeyNotFound)
    }

    /// Returns an iterator over all entries. When `ordered` is `true`, entries
    /// are yielded in ascending lexicographic key order.
    fn iter<'a>(&'a self, ordered: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

    /// Returns a point-in-time snapshot of the store, independent of later writes.
    fn snapshot(&self) -> StoreResult<Box<dyn KeyValueStore>>;

    /// Atomically applies a batch of operations. Backends without native batch
    /// support apply the operations sequentially; a failure part-way through is
    /// surfaced and the batch must not be retried blindly.
    fn write_batch(&mut self, ops: Vec<BatchOp>) -> StoreResult<()> {
        for op in ops {
            match op {
                BatchOp::Put(key, value) => self.put(&key, &value)?,
                BatchOp::Delete(key) => self.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Flushes any buffered writes to durable storage.
    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Removes every entry from the store.
    fn clear(&mut self) -> StoreResult<()>;

    /// Requests a storage-level compaction. A no-op for backends without one.
    fn compact(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Gathers size metrics from the backend.
    fn gather_metrics(&self) -> StoreResult<StoreMetrics>;

    /// The human-readable backend name.
    fn name(&self) -> &'static str;
}
