//! Secure-trie construction: keys are keccak256-hashed before insertion.

use crate::{TrieNode, TrieProvider, TrieResult};
use alloc::vec::Vec;
use alloy_primitives::{keccak256, Bytes, B256};
use alloy_trie::Nibbles;

/// Computes the root of the Merkle Patricia Trie holding the given key-value
/// pairs, keyed by the raw (unhashed) keys. Pairs may arrive in any order;
/// equal inputs produce byte-identical roots.
pub fn trie_root<K, V, I>(pairs: I) -> TrieResult<B256>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: Into<Bytes>,
{
    let mut root = TrieNode::Empty;
    for (key, value) in pairs {
        root.insert(&Nibbles::unpack(key.as_ref()), value.into(), &crate::NoopTrieProvider)?;
    }
    Ok(root.root_hash())
}

/// A Merkle Patricia Trie whose keys are keccak256-hashed before insertion,
/// as the account and storage tries require.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SecureTrie<P: TrieProvider> {
    root: TrieNode,
    provider: P,
}

impl<P: TrieProvider> SecureTrie<P> {
    /// Creates an empty [SecureTrie].
    pub const fn new(provider: P) -> Self {
        Self { root: TrieNode::Empty, provider }
    }

    /// Creates a [SecureTrie] rooted at a previously committed root hash.
    /// Nodes are resolved through the provider on demand.
    pub const fn from_root(commitment: B256, provider: P) -> Self {
        Self { root: TrieNode::new_blinded(commitment), provider }
    }

    /// Returns a shared reference to the root [TrieNode].
    pub const fn root_node(&self) -> &TrieNode {
        &self.root
    }

    /// Inserts a value under the keccak256 hash of the key.
    pub fn insert(&mut self, key: &[u8], value: Bytes) -> TrieResult<()> {
        self.root.insert(&Self::hashed_path(key), value, &self.provider)
    }

    /// Fetches the value under the keccak256 hash of the key.
    pub fn get(&mut self, key: &[u8]) -> TrieResult<Option<Bytes>> {
        self.root.open(&Self::hashed_path(key), &self.provider)
    }

    /// Deletes the value under the keccak256 hash of the key. Returns `true`
    /// if a value was removed.
    pub fn delete(&mut self, key: &[u8]) -> TrieResult<bool> {
        self.root.delete(&Self::hashed_path(key), &self.provider)
    }

    /// Computes the current root commitment.
    pub fn root(&self) -> B256 {
        self.root.root_hash()
    }

    /// Emits `(commitment, rlp)` preimage pairs for every hashed node in the
    /// trie, allowing the trie to be persisted and later reopened with
    /// [Self::from_root].
    pub fn write_preimages(&self, sink: &mut dyn FnMut(B256, Bytes)) {
        self.root.write_preimages(sink)
    }

    /// The nibble path for a key: the unpacked keccak256 digest.
    fn hashed_path(key: &[u8]) -> Nibbles {
        Nibbles::unpack(keccak256(key))
    }
}

/// Computes a secure-trie root over the given pairs without retaining the
/// trie.
pub fn secure_trie_root<K, V, I>(pairs: I) -> TrieResult<B256>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: Into<Bytes>,
{
    trie_root(
        pairs
            .into_iter()
            .map(|(key, value)| (keccak256(key.as_ref()), value))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoopTrieProvider, EMPTY_ROOT_HASH};
    use alloy_primitives::b256;

    #[test]
    fn test_empty_mapping_is_empty_trie_root() {
        assert_eq!(trie_root::<&[u8], Bytes, _>([]).unwrap(), EMPTY_ROOT_HASH);
        assert_eq!(SecureTrie::new(NoopTrieProvider).root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_secure_trie_dogs_vector() {
        // `trieanyorder_secureTrie.json` / `dogs` from the published Ethereum
        // trie tests.
        let expected = b256!("d4cd937e4a4368d7931a9cf51686b7e10abb3dce38a39000fd7902a092b64585");

        let mut trie = SecureTrie::new(NoopTrieProvider);
        trie.insert(b"doge", Bytes::from_static(b"coin")).unwrap();
        trie.insert(b"horse", Bytes::from_static(b"stallion")).unwrap();
        trie.insert(b"dog", Bytes::from_static(b"puppy")).unwrap();

        assert_eq!(trie.root(), expected);

        // Any insertion order must agree.
        let batch = secure_trie_root([
            (b"dog".as_slice(), Bytes::from_static(b"puppy")),
            (b"doge".as_slice(), Bytes::from_static(b"coin")),
            (b"horse".as_slice(), Bytes::from_static(b"stallion")),
        ])
        .unwrap();
        assert_eq!(batch, expected);
    }

    #[test]
    fn test_determinism() {
        let pairs = [
            (b"alpha".as_slice(), Bytes::from_static(b"one")),
            (b"beta".as_slice(), Bytes::from_static(b"two")),
            (b"gamma".as_slice(), Bytes::from_static(b"three")),
        ];
        assert_eq!(trie_root(pairs.clone()).unwrap(), trie_root(pairs).unwrap());
    }

    #[test]
    fn test_delete_returns_to_empty_root() {
        let mut trie = SecureTrie::new(NoopTrieProvider);
        trie.insert(b"key", Bytes::from_static(b"value")).unwrap();
        assert_ne!(trie.root(), EMPTY_ROOT_HASH);

        assert!(trie.delete(b"key").unwrap());
        assert_eq!(trie.root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_get_distinguishes_absent() {
        let mut trie = SecureTrie::new(NoopTrieProvider);
        trie.insert(b"present", Bytes::from_static(b"yes")).unwrap();

        assert_eq!(trie.get(b"present").unwrap(), Some(Bytes::from_static(b"yes")));
        assert_eq!(trie.get(b"absent").unwrap(), None);
    }
}
