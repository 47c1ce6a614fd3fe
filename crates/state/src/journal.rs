//! Undo-log entries backing the snapshot stack.

use crate::{Account, StorageSlot};
use alloy_primitives::{Address, B256, U256};
use std::collections::HashMap;

/// A single reversible step recorded by the journal.
///
/// Entries capture the *previous* observable value so that rollback can
/// replay them in reverse; commit simply discards them. The journal never
/// clones whole state maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// An account record changed (including creation and deletion).
    AccountChanged {
        /// The account address.
        address: Address,
        /// The record before the change; [None] if the account did not exist.
        previous: Option<Account>,
    },
    /// A storage slot changed.
    StorageChanged {
        /// The account address.
        address: Address,
        /// The storage key.
        key: U256,
        /// The slot before the change; [None] if the slot was unset.
        previous: Option<StorageSlot>,
    },
    /// An account's entire storage trie was removed.
    StorageWiped {
        /// The account address.
        address: Address,
        /// The storage content before the wipe.
        previous: HashMap<U256, StorageSlot>,
    },
    /// A transient storage slot changed.
    TransientChanged {
        /// The account address.
        address: Address,
        /// The transient storage key.
        key: B256,
        /// The value before the change. Zero means the slot was unset.
        previous: B256,
    },
    /// The address entered the created-accounts set of this transaction.
    AccountCreated {
        /// The account address.
        address: Address,
    },
    /// The address entered the touched set of this transaction.
    AccountTouched {
        /// The account address.
        address: Address,
    },
}
