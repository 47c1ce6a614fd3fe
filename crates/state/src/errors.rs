//! Errors for the `guillotine-state` crate.

use guillotine_mpt::TrieError;
use guillotine_store::StoreError;
use thiserror::Error;

/// A [Result] type alias where the error is [StateError].
pub type StateResult<T> = Result<T, StateError>;

/// An error type for world-state operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    /// A state commitment was requested while the snapshot stack is non-empty.
    #[error("state root requested while a transaction snapshot is open")]
    OpenSnapshot,
    /// An account that was explicitly required is absent.
    #[error("account missing")]
    AccountMissing,
    /// A commit or rollback was requested with no snapshot on the stack.
    #[error("no open transaction snapshot")]
    NoOpenTransaction,
    /// A trie operation failed.
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),
}
