//! The journaled world state of the execution client.
//!
//! [JournaledState] tracks account, storage, and transient-storage mutations
//! behind a nested snapshot stack. Every mutation records an undo entry;
//! rollback replays entries in reverse, commit discards them. State
//! commitments are computed through [guillotine_mpt] and persisted into the
//! `state` column of a [guillotine_store::Database].

mod errors;
pub use errors::{StateError, StateResult};

mod account;
pub use account::{Account, KECCAK_EMPTY};

mod journal;
pub use journal::JournalEntry;

mod state;
pub use state::{JournaledState, StorageSlot};

mod provider;
pub use provider::StoreTrieProvider;
