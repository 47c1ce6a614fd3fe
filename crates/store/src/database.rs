//! Column-family grouping of [KeyValueStore] backends.

use crate::{KeyValueStore, MemoryStore, StoreResult};
use std::collections::HashMap;

/// The column families used by the execution client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Account-trie nodes, storage-trie nodes, and code by code hash.
    State,
    /// Block headers keyed by hash.
    Headers,
    /// Block bodies keyed by hash.
    Bodies,
    /// Receipt lists keyed by block hash.
    Receipts,
    /// Canonical number-to-hash mapping.
    Canonical,
    /// Blob transaction sidecars.
    BlobTxs,
    /// Known peer records.
    Peers,
    /// Discovery v4 node records.
    DiscoveryV4,
    /// Discovery v5 node records.
    DiscoveryV5,
    /// Schema version, chain id, and head markers.
    Metadata,
}

impl Column {
    /// All column families, in persistence order.
    pub const ALL: [Self; 10] = [
        Self::State,
        Self::Headers,
        Self::Bodies,
        Self::Receipts,
        Self::Canonical,
        Self::BlobTxs,
        Self::Peers,
        Self::DiscoveryV4,
        Self::DiscoveryV5,
        Self::Metadata,
    ];

    /// The column family name as persisted by backends.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Headers => "headers",
            Self::Bodies => "bodies",
            Self::Receipts => "receipts",
            Self::Canonical => "canonical",
            Self::BlobTxs => "blob_txs",
            Self::Peers => "peers",
            Self::DiscoveryV4 => "discovery_v4_nodes",
            Self::DiscoveryV5 => "discovery_v5_nodes",
            Self::Metadata => "metadata",
        }
    }
}

/// A set of [KeyValueStore] backends addressed by [Column].
///
/// Every column is always present; [Database::new_in_memory] backs each with a
/// [MemoryStore]. Batches are per-column — there is no cross-column atomic
/// write.
pub struct Database {
    columns: HashMap<Column, Box<dyn KeyValueStore>>,
}

impl core::fmt::Debug for Database {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Database").field("columns", &self.columns.len()).finish()
    }
}

impl Database {
    /// Creates a [Database] with every column backed by a [MemoryStore].
    pub fn new_in_memory() -> Self {
        let mut columns: HashMap<Column, Box<dyn KeyValueStore>> = HashMap::new();
        for column in Column::ALL {
            columns.insert(column, Box::new(MemoryStore::new()));
        }
        Self { columns }
    }

    /// Creates a [Database] from explicit per-column backends. Columns absent
    /// from `columns` are backed by a [MemoryStore].
    pub fn from_columns(mut columns: HashMap<Column, Box<dyn KeyValueStore>>) -> Self {
        for column in Column::ALL {
            columns.entry(column).or_insert_with(|| Box::new(MemoryStore::new()));
        }
        Self { columns }
    }

    /// Returns a shared reference to the backend of the given column.
    pub fn column(&self, column: Column) -> &dyn KeyValueStore {
        self.columns.get(&column).map(AsRef::as_ref).expect("all columns are populated")
    }

    /// Returns an exclusive reference to the backend of the given column.
    pub fn column_mut(&mut self, column: Column) -> &mut (dyn KeyValueStore + 'static) {
        self.columns.get_mut(&column).map(AsMut::as_mut).expect("all columns are populated")
    }

    /// Flushes every column backend.
    pub fn flush_all(&mut self) -> StoreResult<()> {
        for column in Column::ALL {
            self.column_mut(column).flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullStore;

    #[test]
    fn test_column_names() {
        assert_eq!(Column::State.name(), "state");
        assert_eq!(Column::DiscoveryV4.name(), "discovery_v4_nodes");
        assert_eq!(Column::Metadata.name(), "metadata");
    }

    #[test]
    fn test_columns_are_isolated() {
        let mut db = Database::new_in_memory();
        db.column_mut(Column::Headers).put(b"h", b"header").unwrap();

        assert_eq!(db.column(Column::Headers).get(b"h").unwrap(), Some(b"header".to_vec()));
        assert_eq!(db.column(Column::Bodies).get(b"h").unwrap(), None);
    }

    #[test]
    fn test_from_columns_backfills_missing() {
        let mut explicit: HashMap<Column, Box<dyn KeyValueStore>> = HashMap::new();
        explicit.insert(Column::Peers, Box::new(NullStore));
        let mut db = Database::from_columns(explicit);

        db.column_mut(Column::Peers).put(b"p", b"x").unwrap();
        assert_eq!(db.column(Column::Peers).get(b"p").unwrap(), None);

        db.column_mut(Column::State).put(b"s", b"y").unwrap();
        assert_eq!(db.column(Column::State).get(b"s").unwrap(), Some(b"y".to_vec()));
    }
}
