//! This module contains [JournaledState], the journaled world state.

use crate::{Account, JournalEntry, StateError, StateResult};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::Encodable;
use guillotine_mpt::{NoopTrieProvider, SecureTrie};
use guillotine_store::{Column, Database};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A live storage slot value. The value as of the start of the current
/// transaction is tracked separately, pinned at the slot's first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSlot {
    /// The live value of the slot.
    pub current: U256,
}

/// The journaled world state.
///
/// Mutations are recorded as [JournalEntry] undo steps while a transaction
/// snapshot is open. [Self::rollback_transaction] replays the entries in
/// reverse down to the matched [Self::begin_transaction];
/// [Self::commit_transaction] discards them. The state is owned by a single
/// block-processing task; it is not shared across threads.
#[derive(Debug, Default)]
pub struct JournaledState {
    /// Live account records. Never holds an EIP-161-empty account.
    accounts: HashMap<Address, Account>,
    /// Live storage, per account.
    storage: HashMap<Address, HashMap<U256, StorageSlot>>,
    /// Contract code, content-addressed by code hash.
    code: HashMap<B256, Bytes>,
    /// Transaction-scoped storage (EIP-1153).
    transient: HashMap<(Address, B256), B256>,
    /// Accounts created within the current transaction (EIP-6780).
    created: HashSet<Address>,
    /// Accounts touched within the current transaction (EIP-161).
    touched: HashSet<Address>,
    /// Storage values as of the start of the current transaction, recorded at
    /// the first write of each slot.
    original_values: HashMap<(Address, U256), U256>,
    /// The undo log.
    journal: Vec<JournalEntry>,
    /// Journal watermarks; one per open snapshot.
    snapshots: Vec<usize>,
}

impl JournaledState {
    /// Creates an empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot depth. Zero means no transaction is open.
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    // ---------------------------------------------------------------------
    // Accounts
    // ---------------------------------------------------------------------

    /// Returns the account record, or the empty sentinel for non-existent
    /// addresses.
    pub fn get_account(&self, address: Address) -> Account {
        self.accounts.get(&address).copied().unwrap_or(Account::EMPTY)
    }

    /// Returns the account record, preserving the non-existent vs. empty
    /// distinction.
    pub fn get_account_optional(&self, address: Address) -> Option<Account> {
        self.accounts.get(&address).copied()
    }

    /// Sets or deletes the account record. Passing [None] — or the empty
    /// sentinel, which must never be stored — deletes the account.
    pub fn set_account(&mut self, address: Address, account: Option<Account>) {
        let account = account.filter(|account| !account.is_empty());
        let previous = match &account {
            Some(account) => self.accounts.insert(address, *account),
            None => self.accounts.remove(&address),
        };
        self.journal(JournalEntry::AccountChanged { address, previous });
        self.touch(address);
    }

    /// Removes the account and its entire storage trie, transferring the
    /// balance to `beneficiary` first.
    ///
    /// Per EIP-6780, the removal happens only when the account was created in
    /// the current transaction; otherwise only the balance transfer is
    /// observable. A self-beneficiary keeps its balance unless removed.
    pub fn destroy_account(&mut self, address: Address, beneficiary: Address) {
        let account = self.get_account(address);
        self.touch(address);
        self.touch(beneficiary);

        if beneficiary != address && !account.balance.is_zero() {
            let mut to = self.get_account(beneficiary);
            to.balance = to.balance.saturating_add(account.balance);
            self.set_account(beneficiary, Some(to));

            let mut from = account;
            from.balance = U256::ZERO;
            self.set_account(address, Some(from));
        }

        if self.created.contains(&address) {
            let previous = self.accounts.remove(&address);
            self.journal(JournalEntry::AccountChanged { address, previous });
            let previous = self.storage.remove(&address).unwrap_or_default();
            self.journal(JournalEntry::StorageWiped { address, previous });
        }
    }

    /// Records that the account was created in the current transaction.
    pub fn mark_created(&mut self, address: Address) {
        if self.created.insert(address) {
            self.journal(JournalEntry::AccountCreated { address });
        }
    }

    /// Records that the account was touched by a state-changing operation.
    /// Touched accounts that remain empty are deleted when the transaction
    /// commits (EIP-161).
    pub fn touch(&mut self, address: Address) {
        if self.touched.insert(address) {
            self.journal(JournalEntry::AccountTouched { address });
        }
    }

    /// Stores contract code for the account, content-addressed by its keccak
    /// hash.
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        let code_hash = alloy_primitives::keccak256(&code);
        // Code blobs are immutable once stored; an orphaned blob after a
        // rollback is unreachable and harmless, so the map is not journalled.
        self.code.insert(code_hash, code);

        let mut account = self.get_account(address);
        account.code_hash = code_hash;
        self.set_account(address, Some(account));
    }

    /// Returns the code stored under the given code hash.
    pub fn code_by_hash(&self, code_hash: B256) -> Option<&Bytes> {
        self.code.get(&code_hash)
    }

    /// Returns the code of the account, if any.
    pub fn get_code(&self, address: Address) -> Option<&Bytes> {
        let account = self.accounts.get(&address)?;
        account.has_code().then(|| self.code.get(&account.code_hash)).flatten()
    }

    // ---------------------------------------------------------------------
    // Storage
    // ---------------------------------------------------------------------

    /// Returns the value of the storage slot, or zero if unset.
    pub fn get_storage(&self, address: Address, key: U256) -> U256 {
        self.storage
            .get(&address)
            .and_then(|slots| slots.get(&key))
            .map_or(U256::ZERO, |slot| slot.current)
    }

    /// Returns the value the slot held at the start of the current
    /// transaction.
    pub fn get_storage_original(&self, address: Address, key: U256) -> U256 {
        self.original_values
            .get(&(address, key))
            .copied()
            .unwrap_or_else(|| self.get_storage(address, key))
    }

    /// Sets the storage slot. Setting zero deletes the slot; a storage trie
    /// that becomes empty is pruned from its owner at commitment time.
    pub fn set_storage(&mut self, address: Address, key: U256, value: U256) {
        if self.depth() > 0 {
            // The first write in a transaction pins the slot's original value.
            let current = self.get_storage(address, key);
            self.original_values.entry((address, key)).or_insert(current);
        }

        let slots = self.storage.entry(address).or_default();
        let previous = if value.is_zero() {
            slots.remove(&key)
        } else {
            slots.insert(key, StorageSlot { current: value })
        };
        self.journal(JournalEntry::StorageChanged { address, key, previous });
        self.touch(address);
    }

    // ---------------------------------------------------------------------
    // Transient storage (EIP-1153)
    // ---------------------------------------------------------------------

    /// Returns the transient storage slot, or zero if unset.
    pub fn get_transient(&self, address: Address, key: B256) -> B256 {
        self.transient.get(&(address, key)).copied().unwrap_or(B256::ZERO)
    }

    /// Sets the transient storage slot. Transient storage participates in the
    /// snapshot stack and is cleared wholesale at the transaction boundary.
    pub fn set_transient(&mut self, address: Address, key: B256, value: B256) {
        let previous = if value == B256::ZERO {
            self.transient.remove(&(address, key)).unwrap_or(B256::ZERO)
        } else {
            self.transient.insert((address, key), value).unwrap_or(B256::ZERO)
        };
        self.journal(JournalEntry::TransientChanged { address, key, previous });
    }

    // ---------------------------------------------------------------------
    // Snapshot stack
    // ---------------------------------------------------------------------

    /// Pushes a snapshot onto the stack. Snapshots nest.
    pub fn begin_transaction(&mut self) {
        self.snapshots.push(self.journal.len());
    }

    /// Pops the top snapshot, keeping its changes. At depth zero the
    /// transaction ends: touched-but-empty accounts are swept (EIP-161) and
    /// the transaction-scoped sets are cleared.
    pub fn commit_transaction(&mut self) -> StateResult<()> {
        self.snapshots.pop().ok_or(StateError::NoOpenTransaction)?;
        if self.snapshots.is_empty() {
            self.sweep_touched_empty();
            self.end_transaction();
        }
        Ok(())
    }

    /// Pops the top snapshot, replaying its undo entries in reverse so that
    /// every observable value returns to the state at the matched
    /// [Self::begin_transaction].
    pub fn rollback_transaction(&mut self) -> StateResult<()> {
        let watermark = self.snapshots.pop().ok_or(StateError::NoOpenTransaction)?;
        while self.journal.len() > watermark {
            let entry = self.journal.pop().expect("journal is non-empty above watermark");
            self.revert(entry);
        }
        if self.snapshots.is_empty() {
            self.end_transaction();
        }
        Ok(())
    }

    /// Applies a single undo entry.
    fn revert(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::AccountChanged { address, previous } => match previous {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            JournalEntry::StorageChanged { address, key, previous } => {
                let slots = self.storage.entry(address).or_default();
                match previous {
                    Some(slot) => {
                        slots.insert(key, slot);
                    }
                    None => {
                        slots.remove(&key);
                    }
                }
            }
            JournalEntry::StorageWiped { address, previous } => {
                self.storage.insert(address, previous);
            }
            JournalEntry::TransientChanged { address, key, previous } => {
                if previous == B256::ZERO {
                    self.transient.remove(&(address, key));
                } else {
                    self.transient.insert((address, key), previous);
                }
            }
            JournalEntry::AccountCreated { address } => {
                self.created.remove(&address);
            }
            JournalEntry::AccountTouched { address } => {
                self.touched.remove(&address);
            }
        }
    }

    /// Records an undo entry while any snapshot is open. With the stack empty
    /// there is nothing to roll back to, so entries are not retained.
    fn journal(&mut self, entry: JournalEntry) {
        if !self.snapshots.is_empty() {
            self.journal.push(entry);
        }
    }

    /// Deletes touched accounts that remained empty (EIP-161).
    fn sweep_touched_empty(&mut self) {
        let swept = self
            .touched
            .iter()
            .copied()
            .filter(|address| self.accounts.get(address).is_some_and(Account::is_empty))
            .collect::<Vec<_>>();
        for address in swept {
            self.accounts.remove(&address);
            self.storage.remove(&address);
        }
    }

    /// Clears the transaction-scoped sets at the depth-zero boundary.
    fn end_transaction(&mut self) {
        self.journal.clear();
        self.created.clear();
        self.touched.clear();
        self.transient.clear();
        self.original_values.clear();
    }

    // ---------------------------------------------------------------------
    // Commitment
    // ---------------------------------------------------------------------

    /// Computes the state root.
    ///
    /// Fails with [StateError::OpenSnapshot] while the snapshot stack is
    /// non-empty: a commitment over a half-applied transaction is never
    /// meaningful.
    pub fn state_root(&self) -> StateResult<B256> {
        self.build_tries().map(|(root, _, _)| root)
    }

    /// Returns the storage root of a single account.
    pub fn storage_root(&self, address: Address) -> StateResult<B256> {
        if !self.snapshots.is_empty() {
            return Err(StateError::OpenSnapshot);
        }
        Ok(self.build_storage_trie(address)?.root())
    }

    /// Computes the state root and persists every trie node preimage, account
    /// record, and code blob into the `state` column.
    pub fn commit(&mut self, db: &mut Database) -> StateResult<B256> {
        let (root, account_trie, storage_tries) = self.build_tries()?;

        debug!(target: "state", state_root = %root, "Committing world state");

        let state = db.column_mut(Column::State);
        let mut failure = None;
        let mut sink = |hash: B256, preimage: Bytes| {
            if failure.is_none() {
                if let Err(e) = state.put(hash.as_slice(), &preimage) {
                    failure = Some(e);
                }
            }
        };
        account_trie.write_preimages(&mut sink);
        for trie in storage_tries.values() {
            trie.write_preimages(&mut sink);
        }
        if let Some(e) = failure {
            return Err(StateError::Storage(e));
        }

        for (code_hash, code) in &self.code {
            state.put(code_hash.as_slice(), code)?;
        }

        // Refresh the in-map records with their computed storage roots.
        for (address, account) in &mut self.accounts {
            if let Some(trie) = storage_tries.get(address) {
                account.storage_root = trie.root();
            }
        }

        Ok(root)
    }

    /// Builds the account trie and per-account storage tries.
    #[allow(clippy::type_complexity)]
    fn build_tries(
        &self,
    ) -> StateResult<(B256, SecureTrie<NoopTrieProvider>, HashMap<Address, SecureTrie<NoopTrieProvider>>)>
    {
        if !self.snapshots.is_empty() {
            return Err(StateError::OpenSnapshot);
        }

        let mut account_trie = SecureTrie::new(NoopTrieProvider);
        let mut storage_tries = HashMap::with_capacity(self.accounts.len());
        for (address, account) in &self.accounts {
            let storage_trie = self.build_storage_trie(*address)?;

            let mut record = *account;
            record.storage_root = storage_trie.root();

            let mut rlp_buf = Vec::with_capacity(record.length());
            record.encode(&mut rlp_buf);
            account_trie.insert(address.as_slice(), rlp_buf.into())?;

            storage_tries.insert(*address, storage_trie);
        }

        Ok((account_trie.root(), account_trie, storage_tries))
    }

    /// Builds the storage trie of an account. Slot values are RLP-encoded
    /// with leading zeros stripped; zero-valued slots are never present.
    fn build_storage_trie(&self, address: Address) -> StateResult<SecureTrie<NoopTrieProvider>> {
        let mut trie = SecureTrie::new(NoopTrieProvider);
        if let Some(slots) = self.storage.get(&address) {
            for (key, slot) in slots {
                let mut rlp_buf = Vec::with_capacity(33);
                slot.current.encode(&mut rlp_buf);
                trie.insert(&key.to_be_bytes::<32>(), rlp_buf.into())?;
            }
        }
        Ok(trie)
    }
}
