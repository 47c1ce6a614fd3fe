//! Contains a concrete implementation of the [KeyValueStore] trait that stores data on disk
//! using [rocksdb].

use crate::{BatchOp, KeyValueStore, MemoryStore, StoreError, StoreMetrics, StoreResult};
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::path::PathBuf;

/// A simple, synchronous key-value store that stores data on disk.
#[derive(Debug)]
pub struct DiskStore {
    db: DB,
}

impl DiskStore {
    /// Opens (creating if missing) a [DiskStore] at the given data directory.
    pub fn open(data_directory: PathBuf) -> StoreResult<Self> {
        let db = DB::open(&Self::db_options(), data_directory.as_path())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Gets the [Options] for the underlying RocksDB instance.
    fn db_options() -> Options {
        let mut options = Options::default();
        options.set_compression_type(rocksdb::DBCompressionType::Snappy);
        options.create_if_missing(true);
        options
    }
}

impl KeyValueStore for DiskStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.db.get(key).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.db.put(key, value).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.db.delete(key).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn iter<'a>(&'a self, _ordered: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        // RocksDB full iteration is key-ordered already.
        Box::new(
            self.db
                .iterator(IteratorMode::Start)
                .filter_map(|entry| entry.ok())
                .map(|(k, v)| (k.to_vec(), v.to_vec())),
        )
    }

    fn snapshot(&self) -> StoreResult<Box<dyn KeyValueStore>> {
        // Materialize through a RocksDB snapshot so the view is point-in-time.
        let snap = self.db.snapshot();
        let mut mem = MemoryStore::new();
        for entry in snap.iterator(IteratorMode::Start) {
            let (k, v) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            mem.put(&k, &v)?;
        }
        Ok(Box::new(mem))
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put(key, value) => batch.put(key, value),
                BatchOp::Delete(key) => batch.delete(key),
            }
        }
        self.db.write(batch).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.db.flush().map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn clear(&mut self) -> StoreResult<()> {
        let keys = self.iter(false).map(|(k, _)| k).collect::<Vec<_>>();
        let mut batch = WriteBatch::default();
        for key in keys {
            batch.delete(key);
        }
        self.db.write(batch).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn compact(&mut self) -> StoreResult<()> {
        self.db.compact_range::<&[u8], &[u8]>(None, None);
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
        "rocksdb"
    }
}
