//! Contains the [TrieProvider] trait for resolving blinded trie nodes.

use crate::TrieNode;
use alloc::string::ToString;
use alloy_primitives::B256;
use core::fmt::Display;

/// The [TrieProvider] trait defines the synchronous interface for fetching the
/// preimage of a blinded trie node by its commitment.
pub trait TrieProvider {
    /// The error type for fetching trie node preimages.
    type Error: Display + ToString;

    /// Fetches the trie node whose RLP encoding hashes to `commitment`.
    fn trie_node_by_hash(&self, commitment: B256) -> Result<TrieNode, Self::Error>;
}

/// A provider that cannot resolve any node. Useful for fully in-memory tries,
/// where no blinded node is ever encountered on a walked path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopTrieProvider;

impl TrieProvider for NoopTrieProvider {
    type Error = &'static str;

    fn trie_node_by_hash(&self, _commitment: B256) -> Result<TrieNode, Self::Error> {
        Err("no trie provider configured")
    }
}
