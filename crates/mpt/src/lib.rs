//! Utilities for constructing and iterating through a Merkle Patricia Trie.
//!
//! The [TrieNode] type is an in-memory MPT with incremental
//! [insert][TrieNode::insert] / [delete][TrieNode::delete] support and
//! keccak256 commitment via [blind][TrieNode::blind]. [SecureTrie] hashes keys
//! before insertion, as the state and storage tries require.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod errors;
pub use errors::{TrieError, TrieResult};

mod node;
pub use node::TrieNode;

mod secure;
pub use secure::{secure_trie_root, trie_root, SecureTrie};

mod ordered;
pub use ordered::{ordered_trie_root, ordered_trie_with_encoder};

mod traits;
pub use traits::{NoopTrieProvider, TrieProvider};

mod walker;
pub use walker::TrieWalker;

pub use alloy_trie::{Nibbles, EMPTY_ROOT_HASH};
