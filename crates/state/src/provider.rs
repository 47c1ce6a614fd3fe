//! A [TrieProvider] that resolves trie nodes from the `state` column of a
//! [Database].

use alloy_primitives::B256;
use alloy_rlp::Decodable;
use guillotine_mpt::{TrieNode, TrieProvider};
use guillotine_store::{Column, Database};

/// Resolves blinded trie nodes against the `state` column, where committed
/// node preimages are stored keyed by their keccak256 commitment.
#[derive(Debug)]
pub struct StoreTrieProvider<'a> {
    db: &'a Database,
}

impl<'a> StoreTrieProvider<'a> {
    /// Creates a provider over the given database.
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

impl TrieProvider for StoreTrieProvider<'_> {
    type Error = String;

    fn trie_node_by_hash(&self, commitment: B256) -> Result<TrieNode, Self::Error> {
        let preimage = self
            .db
            .column(Column::State)
            .get(commitment.as_slice())
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("missing trie node preimage: {commitment}"))?;
        TrieNode::decode(&mut preimage.as_slice()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JournaledState;
    use alloy_primitives::{Address, Bytes, U256};
    use alloy_rlp::Decodable;
    use guillotine_mpt::SecureTrie;

    #[test]
    fn test_committed_state_is_reopenable() {
        let mut db = Database::new_in_memory();
        let mut state = JournaledState::new();

        let address = Address::repeat_byte(0xAA);
        let mut account = crate::Account::EMPTY;
        account.balance = U256::from(1_000u64);
        account.nonce = 3;
        state.set_account(address, Some(account));
        state.set_storage(address, U256::from(1), U256::from(0x42));

        let root = state.commit(&mut db).unwrap();

        // Reopen the account trie from the committed root and find the record.
        let provider = StoreTrieProvider::new(&db);
        let mut trie = SecureTrie::from_root(root, provider);
        let record = trie.get(address.as_slice()).unwrap().expect("account in trie");
        let decoded = crate::Account::decode(&mut record.as_ref()).unwrap();
        assert_eq!(decoded.balance, U256::from(1_000u64));
        assert_eq!(decoded.nonce, 3);

        // The account's storage trie is committed too.
        let provider = StoreTrieProvider::new(&db);
        let mut storage = SecureTrie::from_root(decoded.storage_root, provider);
        let slot_key = U256::from(1).to_be_bytes::<32>();
        let value = storage.get(&slot_key).unwrap().expect("slot in trie");
        assert_eq!(value, Bytes::from_static(&[0x42]));
    }
}
